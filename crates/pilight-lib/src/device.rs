//! PWM device access — command formatting, channel writes, device opening.
//!
//! The device is the pi-blaster FIFO: a long-lived byte stream that accepts
//! one text command per line, `"<pin>=<fraction>\n"`. There is no batching
//! and no acknowledgement; each channel update is its own write.

use std::fmt;
use std::future::Future;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::color::{Channel, to_fraction};

#[derive(Debug)]
pub enum DeviceError {
    /// The device sink does not exist (daemon not running).
    NotFound(String),
    OpenFailed(String),
    /// The PWM daemon could not be started.
    DaemonFailed(String),
    /// A channel level outside 0-255 was rejected before any I/O.
    OutOfRange { pin: u8, value: i32 },
    /// A fraction outside 0.0-1.0 was rejected before any I/O.
    BadFraction { pin: u8, fraction: f64 },
    WriteFailed(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound(what) => write!(f, "PWM device not found: {what}"),
            DeviceError::OpenFailed(e) => write!(f, "Failed to open PWM device: {e}"),
            DeviceError::DaemonFailed(e) => write!(f, "Failed to start PWM daemon: {e}"),
            DeviceError::OutOfRange { pin, value } => {
                write!(f, "Value {value} for pin {pin} is outside 0-255")
            }
            DeviceError::BadFraction { pin, fraction } => {
                write!(f, "Fraction {fraction} for pin {pin} is outside 0.0-1.0")
            }
            DeviceError::WriteFailed(e) => write!(f, "Device write failed: {e}"),
        }
    }
}

impl std::error::Error for DeviceError {}

pub type Result<T> = std::result::Result<T, DeviceError>;

// ── Channel assignment ──

/// GPIO pin per logical channel. Fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pins {
    #[serde(default = "default_red_pin")]
    pub red: u8,
    #[serde(default = "default_green_pin")]
    pub green: u8,
    #[serde(default = "default_blue_pin")]
    pub blue: u8,
}

fn default_red_pin() -> u8 {
    17
}
fn default_green_pin() -> u8 {
    22
}
fn default_blue_pin() -> u8 {
    27
}

impl Default for Pins {
    fn default() -> Self {
        Pins {
            red: default_red_pin(),
            green: default_green_pin(),
            blue: default_blue_pin(),
        }
    }
}

impl Pins {
    pub fn pin(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.red,
            Channel::Green => self.green,
            Channel::Blue => self.blue,
        }
    }
}

// ── Writer ──

/// Format one device command line.
pub fn format_command(pin: u8, fraction: f64) -> String {
    format!("{pin}={fraction:.6}\n")
}

/// Writes channel commands to the device sink.
pub struct DeviceWriter<W> {
    sink: W,
}

impl<W: AsyncWrite + Unpin> DeviceWriter<W> {
    pub fn new(sink: W) -> Self {
        DeviceWriter { sink }
    }

    /// Write a raw fraction of full intensity to `pin`.
    pub async fn write_fraction(&mut self, pin: u8, fraction: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(DeviceError::BadFraction { pin, fraction });
        }
        let line = format_command(pin, fraction);
        self.sink
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DeviceError::WriteFailed(e.to_string()))?;
        self.sink
            .flush()
            .await
            .map_err(|e| DeviceError::WriteFailed(e.to_string()))
    }

    /// Write a 0-255 channel level to `pin`.
    ///
    /// Levels outside the byte range are rejected without touching the sink.
    pub async fn write_level(&mut self, pin: u8, level: i32) -> Result<()> {
        let value = u8::try_from(level).map_err(|_| DeviceError::OutOfRange { pin, value: level })?;
        self.write_fraction(pin, to_fraction(value)).await
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

// ── Opening ──

/// Open a device, starting its daemon once if the device does not exist yet.
///
/// - `open` is called once, and at most once more after a successful launch.
/// - `launch` is called only when the first open fails with `NotFound`.
/// - Errors other than `NotFound` are returned immediately.
pub async fn open_with_autostart<S, O, OFut, L, LFut>(
    what: &str,
    mut open: O,
    launch: L,
) -> Result<S>
where
    O: FnMut() -> OFut,
    OFut: Future<Output = io::Result<S>>,
    L: FnOnce() -> LFut,
    LFut: Future<Output = io::Result<()>>,
{
    match open().await {
        Ok(sink) => return Ok(sink),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("{what} not found, starting PWM daemon");
        }
        Err(e) => return Err(DeviceError::OpenFailed(format!("{what}: {e}"))),
    }

    launch()
        .await
        .map_err(|e| DeviceError::DaemonFailed(e.to_string()))?;

    open().await.map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            DeviceError::NotFound(format!("{what} (still missing after daemon start)"))
        } else {
            DeviceError::OpenFailed(format!("{what}: {e}"))
        }
    })
}

/// Run the daemon command and wait for it to exit (pi-blaster forks itself).
async fn launch_daemon(command: &str) -> io::Result<()> {
    let status = tokio::process::Command::new(command).status().await?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{command} exited with {status}")))
    }
}

/// Open the device FIFO read-write, launching `daemon_command` if it is missing.
pub async fn open_device(path: &Path, daemon_command: &str) -> Result<tokio::fs::File> {
    let what = path.display().to_string();
    let file = open_with_autostart(
        &what,
        || async move {
            tokio::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .await
        },
        || launch_daemon(daemon_command),
    )
    .await?;
    log::info!("opened PWM device {what}");
    Ok(file)
}

// ── Mock sink for testing ──

/// In-memory mock sink for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    use tokio::io::AsyncWrite;

    /// Records every byte written. Clones share state, so a test can keep one
    /// clone while another is owned by the actor.
    #[derive(Clone, Default)]
    pub struct MockSink {
        written: Arc<Mutex<Vec<u8>>>,
        /// If true, every write returns an error.
        pub fail_writes: Arc<AtomicBool>,
    }

    impl MockSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Everything written so far, split into command lines.
        pub fn lines(&self) -> Vec<String> {
            let written = match self.written.lock() {
                Ok(w) => w.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };
            String::from_utf8_lossy(&written)
                .lines()
                .map(str::to_string)
                .collect()
        }

        /// Command lines addressed to `pin`, parsed back to their fractions.
        pub fn fractions_for(&self, pin: u8) -> Vec<f64> {
            let prefix = format!("{pin}=");
            self.lines()
                .iter()
                .filter_map(|l| l.strip_prefix(&prefix))
                .filter_map(|f| f.parse().ok())
                .collect()
        }

        pub fn clear(&self) {
            if let Ok(mut w) = self.written.lock() {
                w.clear();
            }
        }
    }

    impl AsyncWrite for MockSink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Poll::Ready(Err(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "mock: write failure injected",
                )));
            }
            match self.written.lock() {
                Ok(mut w) => {
                    w.extend_from_slice(buf);
                    Poll::Ready(Ok(buf.len()))
                }
                Err(_) => Poll::Ready(Err(std::io::Error::other("mock: poisoned"))),
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockSink;
    use super::*;
    use std::cell::Cell;

    #[test]
    fn format_command_six_decimals() {
        assert_eq!(format_command(17, 1.0), "17=1.000000\n");
        assert_eq!(format_command(22, 0.0), "22=0.000000\n");
        assert_eq!(format_command(27, to_fraction(200)), "27=0.784314\n");
    }

    #[test]
    fn formatted_fraction_recovers_every_value() {
        for v in 0..=255u8 {
            let line = format_command(4, to_fraction(v));
            let fraction: f64 = line.trim_end()[2..].parse().unwrap();
            assert_eq!(crate::color::from_fraction(fraction), v);
        }
    }

    #[test]
    fn default_pins() {
        let pins = Pins::default();
        assert_eq!(pins.pin(Channel::Red), 17);
        assert_eq!(pins.pin(Channel::Green), 22);
        assert_eq!(pins.pin(Channel::Blue), 27);
    }

    #[tokio::test]
    async fn write_level_emits_one_line() {
        let sink = MockSink::new();
        let mut writer = DeviceWriter::new(sink.clone());
        writer.write_level(17, 255).await.unwrap();
        writer.write_level(22, 0).await.unwrap();
        assert_eq!(sink.lines(), vec!["17=1.000000", "22=0.000000"]);
    }

    #[tokio::test]
    async fn write_level_rejects_out_of_range() {
        let sink = MockSink::new();
        let mut writer = DeviceWriter::new(sink.clone());
        let err = writer.write_level(17, 256).await.unwrap_err();
        assert!(matches!(err, DeviceError::OutOfRange { pin: 17, value: 256 }));
        let err = writer.write_level(17, -1).await.unwrap_err();
        assert!(matches!(err, DeviceError::OutOfRange { value: -1, .. }));
        assert!(sink.lines().is_empty(), "nothing reaches the sink");
    }

    #[tokio::test]
    async fn write_fraction_rejects_out_of_range() {
        let sink = MockSink::new();
        let mut writer = DeviceWriter::new(sink.clone());
        assert!(matches!(
            writer.write_fraction(17, 1.01).await,
            Err(DeviceError::BadFraction { .. })
        ));
        assert!(writer.write_fraction(17, f64::NAN).await.is_err());
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let sink = MockSink::new();
        sink.set_fail_writes(true);
        let mut writer = DeviceWriter::new(sink.clone());
        let err = writer.write_level(17, 10).await.unwrap_err();
        assert!(matches!(err, DeviceError::WriteFailed(_)));
    }

    // ── open_with_autostart ──

    fn not_found() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "no such file")
    }

    #[tokio::test]
    async fn open_succeeds_without_launch() {
        let opens = Cell::new(0);
        let launches = Cell::new(0);
        let result = open_with_autostart(
            "dev",
            || {
                opens.set(opens.get() + 1);
                async { Ok(42) }
            },
            || {
                launches.set(launches.get() + 1);
                async { Ok(()) }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(opens.get(), 1);
        assert_eq!(launches.get(), 0);
    }

    #[tokio::test]
    async fn missing_device_launches_once_then_retries_once() {
        let opens = Cell::new(0);
        let launches = Cell::new(0);
        let result = open_with_autostart(
            "dev",
            || {
                opens.set(opens.get() + 1);
                let n = opens.get();
                async move { if n == 1 { Err(not_found()) } else { Ok(n) } }
            },
            || {
                launches.set(launches.get() + 1);
                async { Ok(()) }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(launches.get(), 1);
    }

    #[tokio::test]
    async fn still_missing_after_launch_is_fatal() {
        let opens = Cell::new(0);
        let launches = Cell::new(0);
        let result: Result<()> = open_with_autostart(
            "dev",
            || {
                opens.set(opens.get() + 1);
                async { Err(not_found()) }
            },
            || {
                launches.set(launches.get() + 1);
                async { Ok(()) }
            },
        )
        .await;
        assert!(matches!(result, Err(DeviceError::NotFound(_))));
        assert_eq!(opens.get(), 2, "exactly one retry");
        assert_eq!(launches.get(), 1, "exactly one launch");
    }

    #[tokio::test]
    async fn failed_launch_skips_retry() {
        let opens = Cell::new(0);
        let result: Result<()> = open_with_autostart(
            "dev",
            || {
                opens.set(opens.get() + 1);
                async { Err(not_found()) }
            },
            || async { Err(io::Error::other("command not found")) },
        )
        .await;
        assert!(matches!(result, Err(DeviceError::DaemonFailed(_))));
        assert_eq!(opens.get(), 1);
    }

    #[tokio::test]
    async fn other_open_errors_are_not_retried() {
        let launches = Cell::new(0);
        let result: Result<()> = open_with_autostart(
            "dev",
            || async { Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")) },
            || {
                launches.set(launches.get() + 1);
                async { Ok(()) }
            },
        )
        .await;
        assert!(matches!(result, Err(DeviceError::OpenFailed(_))));
        assert_eq!(launches.get(), 0);
    }

    #[tokio::test]
    async fn open_device_opens_existing_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = open_device(tmp.path(), "/nonexistent/daemon").await.unwrap();
        let mut writer = DeviceWriter::new(file);
        writer.write_level(17, 255).await.unwrap();
        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(contents, "17=1.000000\n");
    }

    #[tokio::test]
    async fn open_device_missing_with_bad_daemon_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pi-blaster");
        let err = open_device(&path, "/nonexistent/pilight-test-daemon")
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::DaemonFailed(_)));
    }
}
