//! Query completion guard — bounded, detached delivery of color replies.
//!
//! The arbitration actor never waits on a caller. Each reply is handed to a
//! spawned task that races the send against a deadline; a caller that stops
//! draining its reply channel only loses its own answer.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::color::Rgb;

/// Default bound on how long a reply may wait for its caller.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a `QueryColor` reply goes.
pub type ReplyTx = mpsc::Sender<Rgb>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The caller did not take the reply within the deadline.
    TimedOut(Duration),
    /// The caller dropped its receiver before the reply arrived.
    Closed,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::TimedOut(d) => write!(
                f,
                "Color reply not taken by caller within {:.1}s",
                d.as_secs_f64()
            ),
            DeliveryError::Closed => write!(f, "Color reply receiver was dropped"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Send `color` to `reply` on a detached task, abandoning it after `deadline`.
///
/// The returned handle is informational; dropping it does not cancel the
/// delivery. Failures are logged here so a detached delivery is never silent.
pub fn deliver(
    color: Rgb,
    reply: ReplyTx,
    deadline: Duration,
) -> JoinHandle<Result<(), DeliveryError>> {
    tokio::spawn(async move {
        match tokio::time::timeout(deadline, reply.send(color)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                log::warn!("query reply {color} dropped: caller went away");
                Err(DeliveryError::Closed)
            }
            Err(_) => {
                let err = DeliveryError::TimedOut(deadline);
                log::error!("query reply {color} abandoned: {err} (caller is not reading its reply)");
                Err(err)
            }
        }
    })
}
