//! Radipower Simulation Library
//!
//! This crate provides simulated Radipower heads for testing driver code
//! without hardware:
//!
//! - **VirtualHead**: answers command lines with protocol-accurate replies
//! - **run_virtual_head_task**: serves a head over any async stream
//!
//! # Example
//!
//! ```rust
//! use radipower_sim::VirtualHead;
//!
//! let mut head = VirtualHead::new("0.2.1.7.62.1", "RPR2006C");
//! head.set_power_dbm(-25.31);
//!
//! assert_eq!(head.respond("POWER?").as_deref(), Some("-25.31 dBm"));
//! assert_eq!(head.respond("FILTER 9").as_deref(), Some("ERROR 50;[FILTER 9]"));
//! ```

pub mod head;
pub mod task;

pub use head::{VirtualHead, VirtualHeadConfig};
pub use task::{run_virtual_head_task, spawn_virtual_head, VirtualHeadCommand, VirtualHeadHandle};
