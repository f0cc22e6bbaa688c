//! Packet encoding and verification
//!
//! Wire format:
//! - N bytes: payload (ASCII letters)
//! - 1..=8 bytes: CRC-32/ISO-HDLC of the payload, as lowercase hex text
//!   without zero padding
//!
//! There is no length prefix or terminator; the receiver knows the expected
//! packet length because it is comparing against the packet it just sent.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a received frame did not verify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationFailure {
    /// Fewer bytes arrived than were sent
    ShortRead { expected: usize, received: usize },
    /// Frame arrived complete but its checksum tail or payload was damaged
    ChecksumMismatch { expected: String, actual: String },
    /// Read deadline expired before the minimum read size arrived
    TimedOut { received: usize },
    /// Packet does not fit in the receive buffer
    ExceedsBuffer { packet_len: usize, buffer_len: usize },
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationFailure::ShortRead { expected, received } => {
                write!(f, "short read: {received} of {expected} bytes")
            }
            VerificationFailure::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected '{expected}', got '{actual}'")
            }
            VerificationFailure::TimedOut { received } => {
                write!(f, "read timed out after {received} bytes")
            }
            VerificationFailure::ExceedsBuffer {
                packet_len,
                buffer_len,
            } => write!(
                f,
                "packet of {packet_len} bytes exceeds the {buffer_len} byte receive buffer"
            ),
        }
    }
}

/// A payload with its checksum text
#[derive(Debug, Clone)]
pub struct Packet {
    /// Packet payload
    pub payload: Vec<u8>,
    /// CRC32 of the payload
    pub crc: u32,
    checksum: String,
}

impl Packet {
    /// Create a new packet with the given payload
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();
        let crc = calculate_crc(&payload);
        Self {
            payload,
            crc,
            checksum: checksum_text(crc),
        }
    }

    /// Checksum as it appears on the wire
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Encode the packet to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_size());
        bytes.extend_from_slice(&self.payload);
        bytes.extend_from_slice(self.checksum.as_bytes());
        bytes
    }

    /// Get the total encoded size
    pub fn encoded_size(&self) -> usize {
        self.payload.len() + self.checksum.len()
    }

    /// Check a received frame against this packet.
    ///
    /// Only the first `encoded_size()` bytes of `received` are looked at; any
    /// trailing bytes are ignored. The tail must equal the checksum that was
    /// sent, and the payload part must hash to that same checksum.
    pub fn verify(&self, received: &[u8]) -> Result<(), VerificationFailure> {
        let expected_len = self.encoded_size();
        if received.len() < expected_len {
            return Err(VerificationFailure::ShortRead {
                expected: expected_len,
                received: received.len(),
            });
        }

        let frame = &received[..expected_len];
        let (payload, tail) = frame.split_at(self.payload.len());

        if tail != self.checksum.as_bytes() {
            return Err(VerificationFailure::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual: String::from_utf8_lossy(tail).into_owned(),
            });
        }

        let recomputed = checksum_text(calculate_crc(payload));
        if recomputed != self.checksum {
            return Err(VerificationFailure::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual: recomputed,
            });
        }

        Ok(())
    }
}

/// Calculate CRC32 (reflected polynomial 0xEDB88320) of the payload
pub fn calculate_crc(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Render a checksum the way it is put on the wire
pub fn checksum_text(crc: u32) -> String {
    format!("{crc:x}")
}
