//! Device handles
//!
//! The tester never touches a serial port directly. It asks a [`LinkDriver`]
//! for a handle per device, which keeps the search logic independent of the
//! hardware and lets tests substitute scripted devices.

use std::io::{self, ErrorKind, Read, Write};

use super::LinkError;
use crate::config::LinkSettings;

/// An open device: anything that can be written to and read from
pub trait Link: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> Link for T {}

/// Opens device handles at a given baud rate
pub trait LinkDriver {
    /// Open `device` at `baud_rate` with 8 data bits, 1 stop bit and no parity
    fn open(
        &mut self,
        device: &str,
        baud_rate: u32,
        settings: &LinkSettings,
    ) -> Result<Box<dyn Link>, LinkError>;
}

impl<D: LinkDriver + ?Sized> LinkDriver for &mut D {
    fn open(
        &mut self,
        device: &str,
        baud_rate: u32,
        settings: &LinkSettings,
    ) -> Result<Box<dyn Link>, LinkError> {
        (**self).open(device, baud_rate, settings)
    }
}

/// How a read ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The read target was reached, or the device stopped sending
    Complete(usize),
    /// The driver's read deadline expired first
    TimedOut(usize),
}

impl ReadOutcome {
    /// Bytes placed in the buffer
    pub fn received(&self) -> usize {
        match *self {
            ReadOutcome::Complete(n) | ReadOutcome::TimedOut(n) => n,
        }
    }
}

/// Read into `buf` until at least `target` bytes have arrived.
///
/// A zero-length read ends the loop early. Deadline expiry is returned as
/// [`ReadOutcome::TimedOut`] so the caller can treat it as a failed
/// transmission; every other I/O error is passed through.
pub fn read_response(
    link: &mut dyn Link,
    buf: &mut [u8],
    target: usize,
) -> io::Result<ReadOutcome> {
    let target = target.min(buf.len());
    let mut total = 0;

    while total < target {
        match link.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                return Ok(ReadOutcome::TimedOut(total));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(ReadOutcome::Complete(total))
}
