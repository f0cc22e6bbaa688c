//! Full envelope run
//!
//! Speed search, then length search at the speed found, then two delay
//! profiles: one with a short payload and one at the largest length found.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::config::ProbeConfig;
use crate::delay::{profile_delay, DelayProfile};
use crate::protocol::LinkError;
use crate::search::{search_length, search_speed};
use crate::tester::Transmit;

/// Everything a run found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// When the run began
    pub started_at: DateTime<Utc>,
    /// Device set, in bus order
    pub devices: Vec<String>,
    /// Highest verified baud rate, 0 if none verified
    pub best_speed: u32,
    /// Largest verified payload length at `best_speed`, 0 if none verified
    pub best_length: usize,
    /// Delay profile with the short payload
    pub short_delay: Option<DelayProfile>,
    /// Delay profile at `best_length`
    pub long_delay: Option<DelayProfile>,
}

/// Run every search and profile against `tester`
pub fn run<T: Transmit + ?Sized>(
    config: &ProbeConfig,
    tester: &mut T,
) -> Result<ProbeReport, LinkError> {
    let mut report = ProbeReport {
        started_at: Utc::now(),
        devices: config.devices.clone(),
        best_speed: 0,
        best_length: 0,
        short_delay: None,
        long_delay: None,
    };

    info!(
        devices = ?config.devices,
        min = config.speed.min,
        max = config.speed.max,
        "searching for speed"
    );
    report.best_speed = search_speed(tester, config.probe_length, config.speed)?;
    if report.best_speed == 0 {
        warn!("no speed verified, skipping length search and delay profiling");
        return Ok(report);
    }

    info!(speed = report.best_speed, "searching for length");
    report.best_length = search_length(tester, report.best_speed, config.length)?;

    report.short_delay = Some(profile_delay(
        tester,
        config.short_length,
        report.best_speed,
        config.samples,
    )?);

    if report.best_length > 0 {
        report.long_delay = Some(profile_delay(
            tester,
            report.best_length,
            report.best_speed,
            config.samples,
        )?);
    }

    Ok(report)
}

fn write_delay(f: &mut fmt::Formatter<'_>, profile: &DelayProfile) -> fmt::Result {
    match &profile.summary {
        Some(s) => {
            writeln!(
                f,
                "Average delay: {:.3} ms for packet length: {} ({} samples, {}/{} rounds)",
                s.mean_ms, profile.length, s.count, profile.completed, profile.requested
            )?;
            writeln!(f, "  Minimum delay: {:.3} ms", s.min_ms)?;
            writeln!(f, "  Maximum delay: {:.3} ms", s.max_ms)?;
            writeln!(f, "  Std deviation: {:.3} ms", s.std_dev_ms)
        }
        None => writeln!(
            f,
            "Average delay: insufficient data for packet length: {} (0/{} rounds verified)",
            profile.length, profile.requested
        ),
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Devices: {}", self.devices.join(", "))?;
        if self.best_speed == 0 {
            return writeln!(f, "No working speed found");
        }
        writeln!(f, "Last known working speed: {} baud", self.best_speed)?;
        writeln!(f, "Last known working length: {} bytes", self.best_length)?;
        for profile in [&self.short_delay, &self.long_delay].into_iter().flatten() {
            write_delay(f, profile)?;
        }
        Ok(())
    }
}
