//! # linkprobe core library
//!
//! Characterizes a serial link between two or more devices: the highest
//! baud rate that carries data intact, the largest packet that survives at
//! that rate, and the round-trip latency.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Random letter payloads tagged with a CRC-32 hex checksum
//! - A transmission tester that sends a packet from every device in turn and
//!   verifies what comes back
//! - Stepped speed and length searches built on the tester
//! - A delay profiler with min/max/mean statistics
//! - A `serialport` driver for real hardware and a simulated bus for dry runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use linkprobe_core::prelude::*;
//!
//! let devices = vec!["/dev/ttyUSB0".to_string()];
//! let mut tester = Tester::new(SerialDriver::new(), devices, LinkSettings::default());
//!
//! let speed = search_speed(&mut tester, 20, SpeedRange { min: 9600, max: 1_000_000 })?;
//! let length = search_length(&mut tester, speed, LengthRange { min: 100, max: 5000 })?;
//! let profile = profile_delay(&mut tester, length, speed, 10)?;
//! println!("{speed} baud, {length} bytes, {:?} ms", profile.average_ms());
//! ```

pub mod config;
pub mod delay;
pub mod payload;
pub mod probe;
pub mod protocol;
pub mod search;
pub mod simulated;
pub mod stats;
pub mod tester;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{
        LengthRange, LinkSettings, ProbeConfig, ReadPolicy, ReceiveMode, SpeedRange,
    };
    pub use crate::delay::{profile_delay, DelayProfile};
    pub use crate::probe::ProbeReport;
    pub use crate::protocol::{LinkDriver, LinkError, Packet, SerialDriver, VerificationFailure};
    pub use crate::search::{search_length, search_speed};
    pub use crate::simulated::{BusModel, SimulatedDriver};
    pub use crate::stats::LatencySummary;
    pub use crate::tester::{Tester, Transmit, TransmissionResult};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
