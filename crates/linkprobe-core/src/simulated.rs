//! Simulated bus
//!
//! A stand-in for real hardware: every device echoes what it is sent, but
//! frames sent above the bus's reliable baud rate or larger than its
//! reliable frame size come back with a flipped bit. Lets a full run
//! (`linkprobe --simulate`) go without a cable attached. A port only hears
//! itself, so only echo mode works here.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::config::LinkSettings;
use crate::protocol::{Link, LinkDriver, LinkError};

/// Limits and timing of the simulated bus
#[derive(Debug, Clone, PartialEq)]
pub struct BusModel {
    /// Highest baud rate that delivers frames intact
    pub max_baud: u32,
    /// Largest frame in bytes that is delivered intact
    pub max_frame: usize,
    /// Fixed turnaround added to every response
    pub base_latency: Duration,
    /// Upper bound of the random extra delay per response
    pub jitter: Duration,
    /// Actually sleep for the modelled latency
    pub realtime: bool,
}

impl Default for BusModel {
    fn default() -> Self {
        Self {
            max_baud: 115_200,
            max_frame: 4096,
            base_latency: Duration::from_micros(500),
            jitter: Duration::from_micros(200),
            realtime: true,
        }
    }
}

impl BusModel {
    /// Time the bus needs to answer a frame of `len` bytes at `baud`
    /// (10 bits per byte: start, 8 data, stop; out and back)
    pub fn response_time(&self, len: usize, baud: u32, jitter_fraction: f64) -> Duration {
        let wire = if baud == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((len as f64 * 10.0 * 2.0) / baud as f64)
        };
        self.base_latency + wire + self.jitter.mul_f64(jitter_fraction.clamp(0.0, 1.0))
    }

    fn delivers(&self, len: usize, baud: u32) -> bool {
        baud <= self.max_baud && len <= self.max_frame
    }
}

/// Driver handing out simulated echo devices
pub struct SimulatedDriver {
    model: BusModel,
    rng: StdRng,
    opened: usize,
}

impl SimulatedDriver {
    /// Create a driver with an entropy-seeded generator
    pub fn new(model: BusModel) -> Self {
        Self::with_seed(model, rand::random())
    }

    /// Create a driver whose corruption and jitter are reproducible
    pub fn with_seed(model: BusModel, seed: u64) -> Self {
        Self {
            model,
            rng: StdRng::seed_from_u64(seed),
            opened: 0,
        }
    }

    /// Limits of the simulated bus
    pub fn model(&self) -> &BusModel {
        &self.model
    }

    /// Number of device handles opened so far
    pub fn opened(&self) -> usize {
        self.opened
    }
}

impl LinkDriver for SimulatedDriver {
    fn open(
        &mut self,
        device: &str,
        baud_rate: u32,
        _settings: &LinkSettings,
    ) -> Result<Box<dyn Link>, LinkError> {
        if baud_rate == 0 {
            return Err(LinkError::Open {
                device: device.to_string(),
                reason: "baud rate must be greater than zero".to_string(),
            });
        }
        self.opened += 1;
        Ok(Box::new(SimulatedLink {
            model: self.model.clone(),
            baud: baud_rate,
            rng: StdRng::seed_from_u64(self.rng.gen()),
            pending: Vec::new(),
        }))
    }
}

/// One simulated echo device
struct SimulatedLink {
    model: BusModel,
    baud: u32,
    rng: StdRng,
    pending: Vec<u8>,
}

impl Write for SimulatedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimulatedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no response"));
        }

        let frame_len = self.pending.len();
        if !self.model.delivers(frame_len, self.baud) {
            let idx = self.rng.gen_range(0..frame_len);
            self.pending[idx] ^= 1u8 << self.rng.gen_range(0..7u32);
        }

        if self.model.realtime {
            let jitter: f64 = self.rng.gen();
            std::thread::sleep(self.model.response_time(frame_len, self.baud, jitter));
        }

        let n = frame_len.min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}
