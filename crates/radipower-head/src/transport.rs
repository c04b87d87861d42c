//! Line-oriented request/response over an async byte stream
//!
//! One command is in flight at a time: every operation takes `&mut self`.
//! There are no retries here; callers that want them (identification)
//! loop themselves.
//!
//! A timeout leaves the transport out of step: the abandoned reply may still
//! arrive and would be taken for the answer to the next command. Every later
//! send fails with [`HeadError::Desynced`] until [`Transport::resync`] has
//! drained the line.
//!
//! ## Virtual Heads
//!
//! Any `AsyncRead + AsyncWrite` works, so tests hand in one end of
//! `tokio::io::duplex()` connected to a virtual head task.

use std::io;
use std::time::Duration;

use radipower_protocol::{classify, Command, LINE_TERMINATOR};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::time::{timeout, timeout_at, Instant};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, trace, warn};

use crate::error::{Direction, HeadError};

/// Shortest wait after opening before the first command
pub const MIN_SETTLE: Duration = Duration::from_millis(20);

/// Serial link parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Host-side bit rate in bits per second
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Wait after opening the port, clamped to at least 20 ms
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// Deadline for a complete reply line
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Deadline for writing one command line
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_settle_ms() -> u64 {
    20
}

fn default_read_timeout_ms() -> u64 {
    3000
}

fn default_write_timeout_ms() -> u64 {
    500
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            settle_ms: default_settle_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl LinkConfig {
    /// Settle delay, never below [`MIN_SETTLE`]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms).max(MIN_SETTLE)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Streams whose host-side bit rate can follow a `BAUD` change
pub trait LineRate {
    fn set_line_rate(&mut self, bits_per_second: u32) -> io::Result<()>;
}

impl LineRate for SerialStream {
    fn set_line_rate(&mut self, bits_per_second: u32) -> io::Result<()> {
        SerialPort::set_baud_rate(self, bits_per_second).map_err(io::Error::from)
    }
}

/// In-memory links have no bit rate
impl LineRate for DuplexStream {
    fn set_line_rate(&mut self, _bits_per_second: u32) -> io::Result<()> {
        Ok(())
    }
}

/// Everything a transport needs from its stream
pub trait Link: AsyncRead + AsyncWrite + LineRate + Unpin + Send {}

impl<T> Link for T where T: AsyncRead + AsyncWrite + LineRate + Unpin + Send {}

/// A line transport to one head
pub struct Transport<L> {
    port: String,
    io: L,
    config: LinkConfig,
    pending: Vec<u8>,
    buffer: [u8; 256],
    desynced: bool,
}

impl<L: Link> Transport<L> {
    /// Wrap an already-open stream and wait for the link to settle
    pub async fn open(port: impl Into<String>, io: L, config: &LinkConfig) -> Self {
        let port = port.into();
        tokio::time::sleep(config.settle_delay()).await;
        debug!("Link to {} ready", port);
        Self {
            port,
            io,
            config: config.clone(),
            pending: Vec::with_capacity(64),
            buffer: [0u8; 256],
            desynced: false,
        }
    }

    /// Port name used in logs and errors
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// True after a timeout until [`Transport::resync`] succeeds
    pub fn is_desynced(&self) -> bool {
        self.desynced
    }

    /// Write one command line
    pub async fn send(&mut self, command: &Command) -> Result<(), HeadError> {
        if self.desynced {
            return Err(HeadError::Desynced {
                port: self.port.clone(),
            });
        }
        if !self.pending.is_empty() {
            warn!(
                "Discarding {} stale bytes on {}: {:?}",
                self.pending.len(),
                self.port,
                String::from_utf8_lossy(&self.pending)
            );
            self.pending.clear();
        }

        let bytes = command.encode();
        trace!("{} <- {:?}", self.port, String::from_utf8_lossy(&bytes));

        let limit = self.config.write_timeout();
        let io = &mut self.io;
        let write = async move {
            io.write_all(&bytes).await?;
            io.flush().await
        };
        let result = timeout(limit, write).await;
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.io_error(e)),
            Err(_) => {
                self.desynced = true;
                Err(HeadError::Timeout {
                    port: self.port.clone(),
                    command: command.to_line(),
                    direction: Direction::Write,
                    after_ms: self.config.write_timeout_ms,
                })
            }
        }
    }

    /// Read one reply line, terminator removed
    pub async fn receive(&mut self, command: &Command) -> Result<String, HeadError> {
        let deadline = Instant::now() + self.config.read_timeout();
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == LINE_TERMINATOR) {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line[..pos])
                    .trim_end_matches('\r')
                    .to_string();
                trace!("{} -> {:?}", self.port, text);
                return Ok(text);
            }

            let read = timeout_at(deadline, self.io.read(&mut self.buffer)).await;
            match read {
                Ok(Ok(0)) => {
                    return Err(HeadError::Closed {
                        port: self.port.clone(),
                    })
                }
                Ok(Ok(n)) => self.pending.extend_from_slice(&self.buffer[..n]),
                Ok(Err(e)) => return Err(self.io_error(e)),
                Err(_) => {
                    self.desynced = true;
                    return Err(HeadError::Timeout {
                        port: self.port.clone(),
                        command: command.to_line(),
                        direction: Direction::Read,
                        after_ms: self.config.read_timeout_ms,
                    })
                }
            }
        }
    }

    /// Send a command and return the raw reply line
    pub async fn exchange(&mut self, command: &Command) -> Result<String, HeadError> {
        self.send(command).await?;
        let reply = self.receive(command).await?;
        debug!("{}: {} -> {}", self.port, command, reply);
        Ok(reply)
    }

    /// Send a command and return its payload, or the device error it raised
    pub async fn request(&mut self, command: &Command) -> Result<String, HeadError> {
        let reply = self.exchange(command).await?;
        let payload = classify(&reply)?;
        Ok(payload.to_string())
    }

    /// Discard input until the line has been quiet for `quiet`
    ///
    /// Drops any late reply to a timed-out command and puts the transport
    /// back in step.
    pub async fn resync(&mut self, quiet: Duration) -> Result<(), HeadError> {
        let mut discarded = std::mem::take(&mut self.pending).len();
        loop {
            let read = timeout(quiet, self.io.read(&mut self.buffer)).await;
            match read {
                Ok(Ok(0)) => {
                    return Err(HeadError::Closed {
                        port: self.port.clone(),
                    })
                }
                Ok(Ok(n)) => discarded += n,
                Ok(Err(e)) => return Err(self.io_error(e)),
                Err(_) => break,
            }
        }
        if discarded > 0 {
            warn!("Discarded {} late bytes on {}", discarded, self.port);
        }
        self.desynced = false;
        debug!("{}: back in step", self.port);
        Ok(())
    }

    /// Change the host-side bit rate
    pub fn set_line_rate(&mut self, bits_per_second: u32) -> Result<(), HeadError> {
        debug!("{}: host line rate {} bps", self.port, bits_per_second);
        self.io
            .set_line_rate(bits_per_second)
            .map_err(|e| self.io_error(e))
    }

    /// Flush and close the link
    pub async fn shutdown(mut self) -> Result<(), HeadError> {
        let result = self.io.shutdown().await;
        result.map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: io::Error) -> HeadError {
        HeadError::Io {
            port: self.port.clone(),
            source,
        }
    }
}

/// Open a serial port and wrap it in a transport
pub async fn open_serial(
    port: &str,
    config: &LinkConfig,
) -> Result<Transport<SerialStream>, HeadError> {
    let stream = tokio_serial::new(port, config.baud_rate)
        .timeout(config.read_timeout())
        .open_native_async()
        .map_err(|source| HeadError::Open {
            port: port.to_string(),
            source,
        })?;
    Ok(Transport::open(port, stream, config).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use radipower_protocol::DeviceErrorKind;
    use tokio::io::duplex;

    fn quick() -> LinkConfig {
        LinkConfig {
            read_timeout_ms: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_settle_is_clamped() {
        let config = LinkConfig {
            settle_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.settle_delay(), MIN_SETTLE);

        let config = LinkConfig {
            settle_ms: 250,
            ..Default::default()
        };
        assert_eq!(config.settle_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: LinkConfig = serde_json::from_str(r#"{"baud_rate": 460800}"#).unwrap();
        assert_eq!(config.baud_rate, 460_800);
        assert_eq!(config.read_timeout(), Duration::from_secs(3));
        assert_eq!(config.write_timeout(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_request_returns_payload() {
        let (ours, mut theirs) = duplex(256);
        let mut transport = Transport::open("test", ours, &quick()).await;

        let reply = async {
            let mut buf = [0u8; 64];
            let n = theirs.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"ID_NUMBER?\n");
            theirs.write_all(b"0.2.1.7.62.1\r\n").await.unwrap();
            theirs
        };
        let (result, _theirs) = tokio::join!(transport.request(&Command::IdNumber), reply);
        assert_eq!(result.unwrap(), "0.2.1.7.62.1");
    }

    #[tokio::test]
    async fn test_reply_split_across_reads() {
        let (ours, mut theirs) = duplex(256);
        let mut transport = Transport::open("test", ours, &quick()).await;

        let reply = async {
            let mut buf = [0u8; 64];
            let _ = theirs.read(&mut buf).await.unwrap();
            theirs.write_all(b"-25.").await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
            theirs.write_all(b"31 dBm\n").await.unwrap();
            theirs
        };
        let (result, _theirs) = tokio::join!(transport.request(&Command::Power), reply);
        assert_eq!(result.unwrap(), "-25.31 dBm");
    }

    #[tokio::test]
    async fn test_error_reply_is_classified() {
        let (ours, mut theirs) = duplex(256);
        let mut transport = Transport::open("test", ours, &quick()).await;

        let reply = async {
            let mut buf = [0u8; 64];
            let _ = theirs.read(&mut buf).await.unwrap();
            theirs.write_all(b"ERROR 1;[ACQ_SPEED 20]\n").await.unwrap();
            theirs
        };
        let command = Command::SetAcqSpeed(20);
        let (result, _theirs) = tokio::join!(transport.request(&command), reply);
        let err = result.unwrap_err();
        assert_eq!(err.device_kind(), Some(DeviceErrorKind::InvalidCommand));
    }

    #[tokio::test]
    async fn test_silence_times_out() {
        let (ours, _theirs) = duplex(256);
        let mut transport = Transport::open("test", ours, &quick()).await;
        let err = transport.request(&Command::IdNumber).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(matches!(
            err,
            HeadError::Timeout {
                direction: Direction::Read,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_late_reply_is_not_taken_for_the_next() {
        let (ours, mut theirs) = duplex(256);
        let config = LinkConfig {
            read_timeout_ms: 50,
            ..Default::default()
        };
        let mut transport = Transport::open("test", ours, &config).await;

        let head = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = theirs.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"POWER?\n");
            tokio::time::sleep(Duration::from_millis(120)).await;
            theirs.write_all(b"-25.31 dBm\n").await.unwrap();

            let n = theirs.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"TEMPERATURE?\n");
            theirs.write_all(b"253\n").await.unwrap();
            theirs
        });

        let err = transport.request(&Command::Power).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(transport.is_desynced());

        // Nothing goes out while a stale reply may be on its way
        let err = transport.request(&Command::Temperature).await.unwrap_err();
        assert!(err.is_desynced());

        transport.resync(Duration::from_millis(100)).await.unwrap();
        assert!(!transport.is_desynced());
        assert_eq!(transport.request(&Command::Temperature).await.unwrap(), "253");
        let _theirs = head.await.unwrap();
    }

    #[tokio::test]
    async fn test_hangup_is_closed() {
        let (ours, theirs) = duplex(256);
        let mut transport = Transport::open("test", ours, &quick()).await;
        drop(theirs);
        let err = transport.exchange(&Command::IdNumber).await.unwrap_err();
        assert!(matches!(err, HeadError::Closed { .. } | HeadError::Io { .. }));
    }
}
