//! Delay profiler
//!
//! Repeats transmissions at a fixed length and speed and summarizes every
//! per-device latency from the rounds that verified.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::protocol::LinkError;
use crate::stats::LatencySummary;
use crate::tester::Transmit;

/// Result of a delay profiling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayProfile {
    /// Payload length used
    pub length: usize,
    /// Baud rate used
    pub speed: u32,
    /// Rounds asked for
    pub requested: usize,
    /// Rounds that verified before the first failure
    pub completed: usize,
    /// `None` when no round verified
    pub summary: Option<LatencySummary>,
}

impl DelayProfile {
    /// Mean latency in milliseconds, if any round verified
    pub fn average_ms(&self) -> Option<f64> {
        self.summary.as_ref().map(|s| s.mean_ms)
    }

    /// True when every requested round verified
    pub fn is_complete(&self) -> bool {
        self.completed == self.requested
    }
}

/// Run up to `samples` rounds of `length`-byte payloads at `speed`, stopping
/// at the first round that fails verification.
pub fn profile_delay<T: Transmit + ?Sized>(
    tester: &mut T,
    length: usize,
    speed: u32,
    samples: usize,
) -> Result<DelayProfile, LinkError> {
    let mut latencies: Vec<Duration> = Vec::new();
    let mut completed = 0;

    for round in 0..samples {
        let result = tester.transmit(length, speed)?;
        if !result.success {
            warn!(round, length, speed, "delay profiling stopped on failed round");
            break;
        }
        latencies.extend(result.latencies);
        completed += 1;
    }

    let summary = LatencySummary::from_samples(&latencies);
    match &summary {
        Some(s) => info!(
            length,
            speed,
            samples = s.count,
            min_ms = s.min_ms,
            max_ms = s.max_ms,
            mean_ms = s.mean_ms,
            "delay profile"
        ),
        None => warn!(length, speed, "delay profile has no samples"),
    }

    Ok(DelayProfile {
        length,
        speed,
        requested: samples,
        completed,
        summary,
    })
}
