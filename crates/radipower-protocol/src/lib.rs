//! Radipower Protocol Library
//!
//! This crate provides the wire-level pieces for driving Radipower RF power
//! heads over their ASCII, newline-terminated serial protocol:
//!
//! - **Commands**: encoding and parsing of every command line
//! - **Replies**: classification into payload or one of the device error kinds
//! - **Models**: model families with their averaging ladders and acquisition speeds
//! - **Averaging**: filter codes, AUTO banding, ladder bracketing and selection policies
//! - **Timing**: baud codes and the per-exchange time budget
//! - **Video bandwidth**: VBW codes and their coupling to acquisition speed
//!
//! Nothing here performs I/O; the `radipower-head` crate drives a link.
//!
//! # Example
//!
//! ```rust
//! use radipower_protocol::{classify, decode_power, auto_filter_code, DeviceErrorKind};
//!
//! let payload = classify("-25.31 dBm").unwrap();
//! let reading = decode_power(payload).unwrap();
//! assert_eq!(auto_filter_code(reading.value).get(), 4);
//!
//! let err = classify("ERROR 1;[ACQ_SPEED 20]").unwrap_err();
//! assert_eq!(err.kind, DeviceErrorKind::InvalidCommand);
//! assert_eq!(err.fragment.as_deref(), Some("ACQ_SPEED 20"));
//! ```

pub mod averaging;
pub mod command;
pub mod error;
pub mod models;
pub mod response;
pub mod timing;
pub mod video;

pub use averaging::{
    auto_filter_code, filter_bounds, resolve_sample_count, select_filter, AveragingPolicy,
    FilterCode, FilterSetting,
};
pub use command::{Command, LINE_TERMINATOR};
pub use error::{DeviceError, DeviceErrorKind, ParseError, ProtocolError};
pub use models::{model_token, FamilyTraits, ModelFamily};
pub use response::{
    classify, decode_acq_speed, decode_baud, decode_filter, decode_frequency, decode_power,
    decode_power_unit, decode_temperature, decode_vbw, PowerReading, PowerUnit,
};
pub use timing::{exchange_time, BaudCode};
pub use video::{VbwCode, VbwSetting};
