//! Radipower Head Library
//!
//! Drives one Radipower head over an async byte stream:
//!
//! - **Transport**: one command line out, one reply line back, with read and
//!   write deadlines and no retries
//! - **Session**: the open head, its identity, a mirror of its configuration,
//!   and every calibration, measurement and averaging operation
//!
//! Serial ports are opened with [`open_serial`]; tests use one end of
//! `tokio::io::duplex()` against a virtual head.
//!
//! # Example
//!
//! ```rust,no_run
//! use radipower_head::{open_serial, LinkConfig, Session};
//! use radipower_protocol::{AveragingPolicy, Command};
//!
//! # async fn run() -> Result<(), radipower_head::HeadError> {
//! let mut transport = open_serial("/dev/ttyACM0", &LinkConfig::default()).await?;
//! let serial = transport.request(&Command::IdNumber).await?;
//! let mut session = Session::establish(transport, serial).await?;
//!
//! session.set_frequency(1_000_000_000).await?;
//! session.apply_averaging(100, AveragingPolicy::Closest).await?;
//! let reading = session.read_power().await?;
//! println!("{reading} in {:?}", session.estimated_exchange_time());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod session;
pub mod transport;

pub use error::{Direction, HeadError};
pub use session::{Identity, Mirror, Session};
pub use transport::{open_serial, LineRate, Link, LinkConfig, Transport, MIN_SETTLE};
