//! Link protocol
//!
//! The packet format, the device-handle seam the tester drives, and the
//! serialport-backed driver for real hardware.

mod error;
pub mod link;
mod packet;
pub mod serial;

pub use error::LinkError;
pub use link::{read_response, Link, LinkDriver, ReadOutcome};
pub use packet::{calculate_crc, checksum_text, Packet, VerificationFailure};
pub use serial::{list_ports, PortInfo, SerialDriver};

/// Receive buffer size used for every read
pub const RX_BUFFER_SIZE: usize = 10_000;

/// Bytes that must arrive before a read is considered answered
pub const MIN_READ_SIZE: usize = 4;

/// Default read deadline in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
