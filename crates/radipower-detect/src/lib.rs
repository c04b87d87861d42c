//! Radipower Detection Library
//!
//! This crate finds Radipower heads on serial ports and assigns each one a
//! stable channel from a static table of hardware serial numbers.
//!
//! # Example
//!
//! ```rust,no_run
//! use radipower_detect::{enumerate, IdTable, PortScanner, ScanConfig};
//! use radipower_head::LinkConfig;
//!
//! # async fn run() -> Result<(), radipower_detect::DetectError> {
//! let config = ScanConfig::default();
//! let ports = PortScanner::with_config(config.clone()).candidate_ports()?;
//! let found = enumerate(&ports, &IdTable::builtin(), &config, &LinkConfig::default()).await;
//!
//! for (channel, session) in &found.sessions {
//!     println!("{}: {} on {}", channel, session.identity().model, session.port());
//! }
//! # Ok(())
//! # }
//! ```

pub mod enumerate;
pub mod error;
pub mod identity;
pub mod scanner;

pub use enumerate::{enumerate, enumerate_with, identify_device, Enumeration, PortFailure};
pub use error::DetectError;
pub use identity::{
    Binding, Channel, ChannelRegistry, Collision, IdEntry, IdTable, MAX_SLOT, RESERVED_INDEX,
};
pub use scanner::{PortScanner, ScanConfig, SerialPortInfo};
