//! Link errors
//!
//! Everything in here is fatal for the run. Packets that arrive damaged are
//! not errors; they are reported through [`VerificationFailure`](super::VerificationFailure).

use thiserror::Error;

/// Errors that can occur while driving a device on the link
#[derive(Error, Debug)]
pub enum LinkError {
    /// The device could not be opened or configured
    #[error("Failed to open {device}: {reason}")]
    Open {
        /// Device path
        device: String,
        /// Driver's description of the failure
        reason: String,
    },

    /// Writing a frame failed
    #[error("Write to {device} failed: {source}")]
    Write {
        /// Device path
        device: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading a response failed for a reason other than the deadline
    #[error("Read from {device} failed: {source}")]
    Read {
        /// Device path
        device: String,
        #[source]
        source: std::io::Error,
    },

    /// Settings the driver cannot apply
    #[error("Invalid link configuration: {0}")]
    Configuration(String),

    /// Any other I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Name of the device the error happened on, if it is tied to one
    pub fn device(&self) -> Option<&str> {
        match self {
            LinkError::Open { device, .. }
            | LinkError::Write { device, .. }
            | LinkError::Read { device, .. } => Some(device),
            LinkError::Configuration(_) | LinkError::Io(_) => None,
        }
    }
}
