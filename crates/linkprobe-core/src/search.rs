//! Adaptive speed and length search
//!
//! Both searches are coarse stepped sweeps, not bisection. They trade
//! precision for few transmissions on a link that may hang or corrupt at the
//! edges of its envelope.

use tracing::{debug, info};

use crate::config::{LengthRange, SpeedRange};
use crate::protocol::LinkError;
use crate::tester::Transmit;

/// Outer passes of the speed search
pub const SPEED_PASSES: usize = 2;

/// Find the highest baud rate in `range` at which a round of `length`-byte
/// payloads verifies.
///
/// Each pass sweeps upward from the current minimum in steps of
/// `max / min`, so the step shrinks as the minimum grows. The first failing
/// speed becomes the minimum of the next pass. A pass that sweeps to `max`
/// without a failure ends the search. Returns the last speed that verified,
/// or 0 if none did.
pub fn search_speed<T: Transmit + ?Sized>(
    tester: &mut T,
    length: usize,
    range: SpeedRange,
) -> Result<u32, LinkError> {
    let SpeedRange { mut min, max } = range;
    let mut last_working = 0;

    if min == 0 {
        return Ok(0);
    }

    for pass in 0..SPEED_PASSES {
        let step = max / min;
        if step < 1 {
            debug!(pass, min, max, "speed range exhausted");
            return Ok(last_working);
        }

        debug!(pass, min, max, step, "speed sweep");
        let mut failed_at = None;
        let mut speed = min;
        while speed <= max {
            if tester.transmit(length, speed)?.success {
                last_working = speed;
            } else {
                failed_at = Some(speed);
                break;
            }
            match speed.checked_add(step) {
                Some(next) => speed = next,
                None => break,
            }
        }

        match failed_at {
            None => {
                info!(speed = last_working, "speed sweep completed without failure");
                return Ok(last_working);
            }
            Some(failed) => {
                info!(last_working, failed, "speed sweep narrowed");
                min = failed;
            }
        }
    }

    Ok(last_working)
}

/// Find the largest payload length in `range` that verifies at `speed`.
///
/// Sweeps upward one byte at a time and stops at the first failure.
/// Returns the last length that verified, or 0 if none did.
pub fn search_length<T: Transmit + ?Sized>(
    tester: &mut T,
    speed: u32,
    range: LengthRange,
) -> Result<usize, LinkError> {
    let mut last_working = 0;

    for length in range.min..=range.max {
        if tester.transmit(length, speed)?.success {
            last_working = length;
        } else {
            info!(last_working, failed = length, speed, "length sweep stopped");
            return Ok(last_working);
        }
    }

    info!(length = last_working, speed, "length sweep completed without failure");
    Ok(last_working)
}
