//! Hardware ID to channel assignment
//!
//! [`IdTable`] is static configuration: each head's serial number maps to
//! one logical channel. [`ChannelRegistry`] records which port each channel
//! was found on during a single enumeration pass.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DetectError;

/// Highest regular channel slot
pub const MAX_SLOT: u8 = 15;

/// Index of the reserved channel for units kept outside the array
pub const RESERVED_INDEX: u8 = 99;

/// Logical channel of a head
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Channel {
    /// Array position 0..=15
    Slot(u8),
    /// Reserved index 99
    Reserved,
}

impl Channel {
    /// Channel for a numeric index
    pub fn new(index: u8) -> Result<Self, DetectError> {
        match index {
            0..=MAX_SLOT => Ok(Channel::Slot(index)),
            RESERVED_INDEX => Ok(Channel::Reserved),
            other => Err(DetectError::InvalidChannel(other)),
        }
    }

    /// Numeric index
    pub fn index(&self) -> u8 {
        match self {
            Channel::Slot(n) => *n,
            Channel::Reserved => RESERVED_INDEX,
        }
    }
}

impl TryFrom<u8> for Channel {
    type Error = DetectError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Channel::new(index)
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> u8 {
        channel.index()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PM{:02}", self.index())
    }
}

/// One row of an ID table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdEntry {
    /// Dot-separated serial number as returned by `ID_NUMBER?`
    pub serial_number: String,
    pub channel: Channel,
}

/// Serial numbers of the heads in the array
const BUILTIN_IDS: &[(&str, u8)] = &[
    ("1.99.234.24.23.0.0.212", 0),
    ("1.222.178.24.23.0.0.50", 1),
    ("1.253.178.24.23.0.0.221", 2),
    ("1.120.234.24.23.0.0.119", 3),
    ("1.104.234.24.23.0.0.44", 4),
    ("1.243.178.24.23.0.0.206", 5),
    ("1.229.178.24.23.0.0.39", 6),
    ("1.152.210.24.23.0.0.228", 7),
    ("114.80.79.87.69.82.0.68", 8),
    ("1.30.144.134.23.0.0.34", 9),
    ("1.20.144.134.23.0.0.237", 10),
    ("1.237.143.134.23.0.0.26", 11),
    ("1.40.144.134.23.0.0.125", 12),
    ("1.250.169.133.23.0.0.40", 13),
    ("1.189.250.90.24.0.0.199", 14),
    ("1.200.250.90.24.0.0.180", 15),
    // out for repair
    ("1.117.145.134.23.0.0.212", RESERVED_INDEX),
];

/// Static serial number to channel table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTable {
    entries: Vec<IdEntry>,
    by_serial: HashMap<String, Channel>,
}

impl IdTable {
    /// Build a table, rejecting repeated serial numbers or channels
    pub fn new(entries: impl IntoIterator<Item = IdEntry>) -> Result<Self, DetectError> {
        let entries: Vec<IdEntry> = entries.into_iter().collect();
        let mut by_serial = HashMap::with_capacity(entries.len());
        let mut channels = HashSet::with_capacity(entries.len());

        for entry in &entries {
            if by_serial
                .insert(entry.serial_number.clone(), entry.channel)
                .is_some()
            {
                return Err(DetectError::DuplicateSerial(entry.serial_number.clone()));
            }
            if !channels.insert(entry.channel) {
                return Err(DetectError::DuplicateChannel(entry.channel));
            }
        }

        Ok(Self { entries, by_serial })
    }

    /// The table compiled into the driver
    pub fn builtin() -> Self {
        let entries = BUILTIN_IDS.iter().filter_map(|(serial, index)| {
            Channel::new(*index).ok().map(|channel| IdEntry {
                serial_number: serial.to_string(),
                channel,
            })
        });
        let entries: Vec<IdEntry> = entries.collect();
        let by_serial = entries
            .iter()
            .map(|e| (e.serial_number.clone(), e.channel))
            .collect();
        Self { entries, by_serial }
    }

    /// Parse a JSON array of `{"serial_number": ..., "channel": ...}`
    pub fn from_json(json: &str) -> Result<Self, DetectError> {
        let entries: Vec<IdEntry> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    /// Load a JSON table from disk
    pub fn load(path: &Path) -> Result<Self, DetectError> {
        let json = std::fs::read_to_string(path).map_err(|e| DetectError::TableLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&json)
    }

    /// Channel for a serial number
    pub fn resolve(&self, serial_number: &str) -> Option<Channel> {
        self.by_serial.get(serial_number).copied()
    }

    pub fn entries(&self) -> &[IdEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for IdTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// A channel already bound to a port when another head claimed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub channel: Channel,
    pub serial_number: String,
    /// Port that keeps the channel
    pub bound_port: String,
    /// Port whose head was turned away
    pub rejected_port: String,
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) on {} already bound to {}",
            self.channel, self.serial_number, self.rejected_port, self.bound_port
        )
    }
}

/// Where a channel was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub serial_number: String,
    pub port: String,
}

/// Channel bindings made during one enumeration pass
///
/// The first head to claim a channel keeps it.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    bindings: BTreeMap<Channel, Binding>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `channel` to `port`, or report who already holds it
    pub fn bind(
        &mut self,
        channel: Channel,
        serial_number: &str,
        port: &str,
    ) -> Result<(), Collision> {
        if let Some(existing) = self.bindings.get(&channel) {
            let collision = Collision {
                channel,
                serial_number: serial_number.to_string(),
                bound_port: existing.port.clone(),
                rejected_port: port.to_string(),
            };
            warn!("Channel collision: {}", collision);
            return Err(collision);
        }
        self.bindings.insert(
            channel,
            Binding {
                serial_number: serial_number.to_string(),
                port: port.to_string(),
            },
        );
        Ok(())
    }

    pub fn get(&self, channel: Channel) -> Option<&Binding> {
        self.bindings.get(&channel)
    }

    pub fn bindings(&self) -> &BTreeMap<Channel, Binding> {
        &self.bindings
    }
}
