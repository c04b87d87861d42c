//! Identification and enumeration of heads
//!
//! Each candidate port is opened, asked for its serial number, resolved
//! against the ID table and brought up as a [`Session`]. A port that fails
//! any of these steps is logged and left out; it never stops the scan.

use std::collections::BTreeMap;
use std::future::Future;

use radipower_head::{open_serial, HeadError, Link, LinkConfig, Session, Transport};
use radipower_protocol::{Command, ProtocolError};
use tokio::time::timeout;
use tokio_serial::SerialStream;
use tracing::{debug, info, warn};

use crate::error::DetectError;
use crate::identity::{Channel, ChannelRegistry, Collision, IdTable};
use crate::scanner::ScanConfig;

/// Ask a head for its serial number, retrying device errors and timeouts
///
/// After a timeout the line is drained before the next attempt so a late
/// reply cannot answer a later command. Closed links and I/O errors end the
/// attempt at once.
pub async fn identify_device<L: Link>(
    transport: &mut Transport<L>,
    attempts: u32,
) -> Result<String, DetectError> {
    let attempts = attempts.max(1);
    let mut last = None;

    for attempt in 1..=attempts {
        let result = match transport.request(&Command::IdNumber).await {
            Ok(serial) if serial.is_empty() => {
                Err(ProtocolError::malformed("ID_NUMBER?", serial).into())
            }
            other => other,
        };

        match result {
            Ok(serial) => {
                debug!("{}: ID {} (attempt {})", transport.port(), serial, attempt);
                return Ok(serial);
            }
            Err(e) if e.is_timeout() || matches!(e, HeadError::Protocol(_)) => {
                warn!(
                    "{}: ID_NUMBER? attempt {}/{} failed: {}",
                    transport.port(),
                    attempt,
                    attempts,
                    e
                );
                if e.is_timeout() && attempt < attempts {
                    let quiet = transport.config().read_timeout();
                    transport
                        .resync(quiet)
                        .await
                        .map_err(|source| DetectError::Head {
                            port: transport.port().to_string(),
                            source,
                        })?;
                }
                last = Some(e);
            }
            Err(e) => {
                return Err(DetectError::Head {
                    port: transport.port().to_string(),
                    source: e,
                })
            }
        }
    }

    Err(DetectError::IdentificationExhausted {
        port: transport.port().to_string(),
        attempts,
        last: last.unwrap_or(HeadError::Closed {
            port: transport.port().to_string(),
        }),
    })
}

/// A port that yielded no session
#[derive(Debug)]
pub struct PortFailure {
    pub port: String,
    pub error: DetectError,
}

/// Result of one enumeration pass
pub struct Enumeration<L> {
    /// Identified heads by channel
    pub sessions: BTreeMap<Channel, Session<L>>,
    /// Ports that were skipped, with the reason
    pub failures: Vec<PortFailure>,
    /// Heads turned away because their channel was already bound
    pub collisions: Vec<Collision>,
}

impl<L> Enumeration<L> {
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ports whose head reported an ID missing from the table
    pub fn unknown_ids(&self) -> impl Iterator<Item = &PortFailure> {
        self.failures
            .iter()
            .filter(|f| matches!(f.error, DetectError::UnknownId { .. }))
    }
}

/// Open, identify and establish every candidate serial port
pub async fn enumerate(
    ports: &[String],
    table: &IdTable,
    config: &ScanConfig,
    link: &LinkConfig,
) -> Enumeration<SerialStream> {
    enumerate_with(ports, table, config, |port| {
        let link = link.clone();
        async move { open_serial(&port, &link).await }
    })
    .await
}

/// Enumerate with a custom way of opening ports
///
/// `opener` receives each port name and returns a ready transport; tests
/// hand out virtual heads this way.
pub async fn enumerate_with<L, F, Fut>(
    ports: &[String],
    table: &IdTable,
    config: &ScanConfig,
    mut opener: F,
) -> Enumeration<L>
where
    L: Link,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Transport<L>, HeadError>>,
{
    let mut registry = ChannelRegistry::new();
    let mut result = Enumeration {
        sessions: BTreeMap::new(),
        failures: Vec::new(),
        collisions: Vec::new(),
    };

    for port in ports {
        let attempt = bring_up(port, table, config, opener(port.clone()));
        let outcome = match timeout(config.port_timeout(), attempt).await {
            Ok(outcome) => outcome,
            Err(_) => Err(DetectError::PortTimeout {
                port: port.clone(),
                after_ms: config.port_timeout_ms,
            }),
        };

        match outcome {
            Ok((channel, session)) => {
                let serial = session.identity().serial_number.clone();
                match registry.bind(channel, &serial, port) {
                    Ok(()) => {
                        info!(
                            "Attached {} model {} on {}",
                            channel,
                            session.identity().model,
                            port
                        );
                        result.sessions.insert(channel, session);
                    }
                    Err(collision) => result.collisions.push(collision),
                }
            }
            Err(error) => {
                warn!("Skipping {}: {}", port, error);
                result.failures.push(PortFailure {
                    port: port.clone(),
                    error,
                });
            }
        }
    }

    info!(
        "Enumeration found {} head(s), {} port(s) skipped",
        result.sessions.len(),
        result.failures.len()
    );
    result
}

async fn bring_up<L, Fut>(
    port: &str,
    table: &IdTable,
    config: &ScanConfig,
    open: Fut,
) -> Result<(Channel, Session<L>), DetectError>
where
    L: Link,
    Fut: Future<Output = Result<Transport<L>, HeadError>>,
{
    let head_error = |source| DetectError::Head {
        port: port.to_string(),
        source,
    };

    let mut transport = open.await.map_err(head_error)?;
    let serial_number = identify_device(&mut transport, config.attempts).await?;
    let channel = table
        .resolve(&serial_number)
        .ok_or_else(|| DetectError::UnknownId {
            port: port.to_string(),
            serial_number: serial_number.clone(),
        })?;
    let session = Session::establish(transport, serial_number)
        .await
        .map_err(head_error)?;
    Ok((channel, session))
}
