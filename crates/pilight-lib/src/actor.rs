//! Arbitration actor — sole owner of the PWM device and the current color.
//!
//! Every device write and every read of the authoritative color happens on a
//! single task, one message at a time. Callers talk to it through a
//! [`BlasterHandle`], which carries two bounded channels:
//!
//! - [`SetColor`]: fire-and-forget; the actor runs the configured
//!   [`Transform`] against its current state.
//! - [`QueryColor`]: the actor snapshots the current color and hands it
//!   to [`guard::deliver`], then goes straight back to its inbox.
//!
//! A send completes only once the actor has taken the message off its inbox
//! (see [`Handoff`]), so two messages from one caller are handled in the
//! order they were sent even though they travel on different channels.
//!
//! No locks guard the state: nothing outside the actor task can reach it.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::color::{Channel, Rgb};
use crate::device::{DeviceError, DeviceWriter, Pins};
use crate::error::{PilightError, Result};
use crate::guard::{self, ReplyTx};
use crate::transform::{Correction, FadeSteps, Transform, fade_steps};

/// Inbox depth. Senders also wait for the [`Handoff`] acknowledgement.
const INBOX_CAPACITY: usize = 1;

/// Set the light to this color. No reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetColor(pub Rgb);

/// Send the current color to this reply channel, exactly once at most.
#[derive(Debug, Clone)]
pub struct QueryColor(pub ReplyTx);

/// A message together with the signal that the actor has received it.
#[derive(Debug)]
pub struct Handoff<T> {
    msg: T,
    taken: oneshot::Sender<()>,
}

impl<T> Handoff<T> {
    pub fn new(msg: T) -> (Self, oneshot::Receiver<()>) {
        let (taken, rx) = oneshot::channel();
        (Handoff { msg, taken }, rx)
    }

    /// Acknowledge receipt to the sender and unwrap the message.
    pub fn take(self) -> T {
        // The sender may have given up waiting; the message still counts.
        let _ = self.taken.send(());
        self.msg
    }
}

/// Which color becomes authoritative after a gamma-corrected set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Store {
    /// What the hardware was told (after correction).
    #[default]
    Corrected,
    /// What the caller asked for; correction happens only on the way out.
    Requested,
}

/// Fixed parameters of the actor, taken from the configuration at startup.
#[derive(Debug, Clone)]
pub struct BlasterSettings {
    pub pins: Pins,
    pub transform: Transform,
    pub store: Store,
    pub query_timeout: Duration,
}

impl Default for BlasterSettings {
    fn default() -> Self {
        BlasterSettings {
            pins: Pins::default(),
            transform: Transform::default(),
            store: Store::default(),
            query_timeout: guard::DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Actor state: the device writer and the authoritative color.
pub struct Blaster<W> {
    writer: DeviceWriter<W>,
    current: Rgb,
    settings: BlasterSettings,
}

impl<W: AsyncWrite + Unpin> Blaster<W> {
    /// Start dark: the initial authoritative color is black.
    pub fn new(writer: DeviceWriter<W>, settings: BlasterSettings) -> Self {
        Blaster {
            writer,
            current: Rgb::BLACK,
            settings,
        }
    }

    pub fn current(&self) -> Rgb {
        self.current
    }

    /// Handle one `SetColor`.
    pub async fn apply(&mut self, target: Rgb) {
        match self.settings.transform {
            Transform::Gamma(correction) => self.apply_corrected(target, correction).await,
            Transform::Fade => self.apply_fade(target).await,
        }
        log::info!("color {target} requested, now {}", self.current);
    }

    /// Write each corrected channel once.
    ///
    /// A channel whose corrected level is out of range is skipped and keeps
    /// its previous value; the others still apply. Write errors are logged and
    /// the channel is recorded anyway, since the command may have landed.
    async fn apply_corrected(&mut self, target: Rgb, correction: Correction) {
        let levels = correction.apply(target);
        for channel in Channel::ALL {
            let pin = self.settings.pins.pin(channel);
            let level = levels.get(channel);
            let Ok(corrected) = u8::try_from(level) else {
                let err = DeviceError::OutOfRange { pin, value: level };
                log::warn!(
                    "{} channel left at {}: {err}",
                    channel.name(),
                    self.current.get(channel)
                );
                continue;
            };
            if let Err(e) = self.writer.write_level(pin, i32::from(corrected)).await {
                log::warn!("{} channel: {e}", channel.name());
            }
            let stored = match self.settings.store {
                Store::Corrected => corrected,
                Store::Requested => target.get(channel),
            };
            self.current.set(channel, stored);
        }
    }

    /// Step all channels toward `target` one unit at a time, in lockstep.
    ///
    /// Best-effort: the target becomes authoritative even if writes failed.
    async fn apply_fade(&mut self, target: Rgb) {
        let mut fades: Vec<(Channel, u8, FadeSteps)> = Channel::ALL
            .iter()
            .map(|&ch| {
                let pin = self.settings.pins.pin(ch);
                (ch, pin, fade_steps(self.current.get(ch), target.get(ch)))
            })
            .collect();

        let mut failed = 0usize;
        let mut last_err = None;
        loop {
            let mut stepped = false;
            for (_, pin, steps) in fades.iter_mut() {
                if let Some(value) = steps.next() {
                    stepped = true;
                    if let Err(e) = self.writer.write_level(*pin, i32::from(value)).await {
                        failed += 1;
                        last_err = Some(e);
                    }
                }
            }
            if !stepped {
                break;
            }
        }
        if let Some(e) = last_err {
            log::warn!("fade to {target}: {failed} writes failed, last: {e}");
        }

        for (channel, _, _) in &fades {
            self.current.set(*channel, target.get(*channel));
        }
    }

    /// Hand the current color to a caller without waiting for it.
    fn answer(&self, reply: ReplyTx) {
        // Detached; the guard logs its own failures.
        drop(guard::deliver(self.current, reply, self.settings.query_timeout));
    }

    /// Serve both inboxes until every handle is dropped.
    ///
    /// Messages are taken from whichever inbox is ready, unordered across the
    /// two and FIFO within each. The device closes when the actor drops.
    pub async fn run(
        mut self,
        mut set_rx: mpsc::Receiver<Handoff<SetColor>>,
        mut query_rx: mpsc::Receiver<Handoff<QueryColor>>,
    ) {
        log::debug!("light controller started");
        loop {
            tokio::select! {
                Some(msg) = set_rx.recv() => {
                    let SetColor(target) = msg.take();
                    self.apply(target).await;
                }
                Some(msg) = query_rx.recv() => {
                    let QueryColor(reply) = msg.take();
                    self.answer(reply);
                }
                else => break,
            }
        }
        log::debug!("light controller stopped at {}", self.current);
    }
}

/// Cloneable sender side of the arbitration actor.
#[derive(Debug, Clone)]
pub struct BlasterHandle {
    set_tx: mpsc::Sender<Handoff<SetColor>>,
    query_tx: mpsc::Sender<Handoff<QueryColor>>,
}

/// Send `msg` and wait until the actor has taken it.
async fn hand_off<T>(tx: &mpsc::Sender<Handoff<T>>, msg: T) -> Result<()> {
    let (handoff, taken) = Handoff::new(msg);
    tx.send(handoff)
        .await
        .map_err(|_| PilightError::ActorClosed)?;
    taken.await.map_err(|_| PilightError::ActorClosed)
}

impl BlasterHandle {
    /// Send a `SetColor`. Suspends until the actor takes it, not until the
    /// color has been written.
    pub async fn set_color(&self, color: Rgb) -> Result<()> {
        hand_off(&self.set_tx, SetColor(color)).await
    }

    /// Send a `QueryColor` whose answer goes to `reply`.
    pub async fn query(&self, reply: ReplyTx) -> Result<()> {
        hand_off(&self.query_tx, QueryColor(reply)).await
    }

    /// Query and wait for the authoritative color.
    pub async fn current_color(&self) -> Result<Rgb> {
        let (tx, mut rx) = mpsc::channel(1);
        self.query(tx).await?;
        rx.recv().await.ok_or(PilightError::ActorClosed)
    }
}

/// Spawn the actor on the current runtime.
///
/// The task ends once every clone of the returned handle is dropped.
pub fn spawn<W>(
    writer: DeviceWriter<W>,
    settings: BlasterSettings,
) -> (BlasterHandle, JoinHandle<()>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (set_tx, set_rx) = mpsc::channel(INBOX_CAPACITY);
    let (query_tx, query_rx) = mpsc::channel(INBOX_CAPACITY);
    let blaster = Blaster::new(writer, settings);
    let task = tokio::spawn(blaster.run(set_rx, query_rx));
    (BlasterHandle { set_tx, query_tx }, task)
}
