//! Virtual head actor task
//!
//! Owns a [`VirtualHead`] and serves it over an async stream. The task uses
//! a select! loop to:
//! - Read command lines from the stream and write the replies back
//! - Handle control commands (power level, fault injection, shutdown)

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::VirtualHead;

/// Buffer size of the in-memory link
const DUPLEX_CAPACITY: usize = 1024;

/// Control commands for a running virtual head
#[derive(Debug, Clone)]
pub enum VirtualHeadCommand {
    /// Change the input power level
    SetPowerDbm(f64),
    /// Refuse the next `n` commands with `ERROR 1`
    FailNext(u32),
    /// Ignore the next `n` commands
    GoSilent(u32),
    /// Stop the task
    Shutdown,
}

/// Run the virtual head task until the stream closes or shutdown is requested
///
/// Returns the head so tests can inspect what it received.
pub async fn run_virtual_head_task<S>(
    mut stream: S,
    mut head: VirtualHead,
    mut cmd_rx: mpsc::Receiver<VirtualHeadCommand>,
) -> io::Result<VirtualHead>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 256];
    let mut pending: Vec<u8> = Vec::with_capacity(64);

    info!("Starting virtual head {}", head.serial_number());

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual head {} stream closed", head.serial_number());
                        break;
                    }
                    Ok(n) => {
                        pending.extend_from_slice(&buf[..n]);
                        while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                            let line_bytes: Vec<u8> = pending.drain(..=pos).collect();
                            let line = String::from_utf8_lossy(&line_bytes).into_owned();

                            if line.trim_end() == "POWER?" {
                                let delay = head.reading_duration();
                                if !delay.is_zero() {
                                    tokio::time::sleep(delay).await;
                                }
                            }

                            if let Some(reply) = head.respond(&line) {
                                stream.write_all(reply.as_bytes()).await?;
                                stream.write_all(b"\n").await?;
                                stream.flush().await?;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Virtual head {} stream error: {}", head.serial_number(), e);
                        return Err(e);
                    }
                }
            }

            Some(cmd) = cmd_rx.recv() => {
                debug!("Virtual head {} control: {:?}", head.serial_number(), cmd);
                match cmd {
                    VirtualHeadCommand::SetPowerDbm(dbm) => head.set_power_dbm(dbm),
                    VirtualHeadCommand::FailNext(n) => head.fail_next(n),
                    VirtualHeadCommand::GoSilent(n) => head.go_silent(n),
                    VirtualHeadCommand::Shutdown => {
                        info!("Virtual head {} shutting down", head.serial_number());
                        break;
                    }
                }
            }
        }
    }

    Ok(head)
}

/// A virtual head running in its own task
pub struct VirtualHeadHandle {
    /// Driver side of the link
    pub stream: DuplexStream,
    /// Control channel
    pub control: mpsc::Sender<VirtualHeadCommand>,
    /// Task handle; yields the head when the task ends
    pub task: JoinHandle<io::Result<VirtualHead>>,
}

/// Spawn a virtual head behind an in-memory duplex stream
pub fn spawn_virtual_head(head: VirtualHead) -> VirtualHeadHandle {
    let (stream, head_stream) = tokio::io::duplex(DUPLEX_CAPACITY);
    let (control, cmd_rx) = mpsc::channel(16);
    let task = tokio::spawn(run_virtual_head_task(head_stream, head, cmd_rx));
    VirtualHeadHandle {
        stream,
        control,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn read_line(stream: &mut DuplexStream) -> String {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = tokio::time::timeout(Duration::from_secs(1), stream.read(&mut byte))
                .await
                .unwrap()
                .unwrap();
            if n == 0 || byte[0] == b'\n' {
                break;
            }
            out.push(byte[0]);
        }
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_task_answers_commands() {
        let mut handle = spawn_virtual_head(VirtualHead::new("9.9.9", "RPR2006C"));

        handle.stream.write_all(b"ID_NUMBER?\n").await.unwrap();
        assert_eq!(read_line(&mut handle.stream).await, "9.9.9");

        handle
            .control
            .send(VirtualHeadCommand::SetPowerDbm(-45.5))
            .await
            .unwrap();
        // Control and stream are independent; give the task a moment
        tokio::time::sleep(Duration::from_millis(10)).await;

        handle.stream.write_all(b"POWER?\n").await.unwrap();
        assert_eq!(read_line(&mut handle.stream).await, "-45.50 dBm");

        handle
            .control
            .send(VirtualHeadCommand::Shutdown)
            .await
            .unwrap();
        let head = handle.task.await.unwrap().unwrap();
        assert_eq!(head.received(), &["ID_NUMBER?", "POWER?"]);
    }

    #[tokio::test]
    async fn test_task_ends_when_driver_hangs_up() {
        let handle = spawn_virtual_head(VirtualHead::new("9.9.9", "RPR2006C"));
        let VirtualHeadHandle { stream, task, .. } = handle;
        drop(stream);
        let head = task.await.unwrap().unwrap();
        assert!(head.received().is_empty());
    }
}
