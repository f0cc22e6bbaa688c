//! Transmission tester
//!
//! One call to [`Tester::transmit`] is one round on the bus: every device in
//! the set takes a turn as transmitter, sends a fresh CRC-tagged packet and
//! the response is verified. The first device that fails verification ends
//! the round.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::{LinkSettings, ReceiveMode};
use crate::payload;
use crate::protocol::{
    read_response, Link, LinkDriver, LinkError, Packet, ReadOutcome, VerificationFailure,
};

/// Which device failed and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionFailure {
    /// Device that was reading when verification failed
    pub device: String,
    /// What the verification found
    pub reason: VerificationFailure,
}

/// Outcome of one round on the bus
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransmissionResult {
    /// True only if every device in the set verified
    pub success: bool,
    /// Write-to-read latency per verified device, in bus order. Shorter than
    /// the device set when the round was cut short.
    pub latencies: Vec<Duration>,
    /// Set when `success` is false
    pub failure: Option<TransmissionFailure>,
}

impl TransmissionResult {
    fn passed(latencies: Vec<Duration>) -> Self {
        Self {
            success: true,
            latencies,
            failure: None,
        }
    }

    fn failed(latencies: Vec<Duration>, device: &str, reason: VerificationFailure) -> Self {
        Self {
            success: false,
            latencies,
            failure: Some(TransmissionFailure {
                device: device.to_string(),
                reason,
            }),
        }
    }
}

/// Something that can run a transmission round at a given length and speed.
///
/// The searches and the delay profiler only depend on this.
pub trait Transmit {
    /// Run one round; `Err` only for device errors, verification failures
    /// are reported in the result
    fn transmit(&mut self, length: usize, speed: u32) -> Result<TransmissionResult, LinkError>;
}

impl<T: Transmit + ?Sized> Transmit for &mut T {
    fn transmit(&mut self, length: usize, speed: u32) -> Result<TransmissionResult, LinkError> {
        (**self).transmit(length, speed)
    }
}

/// Device handles of one round, indexed like the device set. A handle stays
/// open from the moment it is acquired until the session is dropped,
/// whichever way the round ends.
struct Session<'a> {
    devices: &'a [String],
    handles: Vec<Option<Box<dyn Link>>>,
}

impl<'a> Session<'a> {
    fn new(devices: &'a [String]) -> Self {
        Self {
            devices,
            handles: devices.iter().map(|_| None).collect(),
        }
    }

    /// Open device `index` unless it is already held
    fn acquire<D: LinkDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        index: usize,
        speed: u32,
        settings: &LinkSettings,
    ) -> Result<(), LinkError> {
        if self.handles[index].is_none() {
            self.handles[index] = Some(driver.open(&self.devices[index], speed, settings)?);
        }
        Ok(())
    }

    fn link(&mut self, index: usize) -> Result<&mut Box<dyn Link>, LinkError> {
        self.handles[index].as_mut().ok_or_else(|| {
            LinkError::Configuration(format!("{} used before it was opened", self.devices[index]))
        })
    }

    fn write(&mut self, index: usize, frame: &[u8]) -> Result<(), LinkError> {
        let device = self.devices[index].clone();
        let link = self.link(index)?;
        link.write_all(frame)
            .and_then(|_| link.flush())
            .map_err(|source| LinkError::Write { device, source })
    }

    fn read(
        &mut self,
        index: usize,
        buf: &mut [u8],
        target: usize,
    ) -> Result<ReadOutcome, LinkError> {
        let device = self.devices[index].clone();
        let link = self.link(index)?;
        read_response(link.as_mut(), buf, target)
            .map_err(|source| LinkError::Read { device, source })
    }

    fn open_count(&self) -> usize {
        self.handles.iter().filter(|h| h.is_some()).count()
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        debug!(devices = self.open_count(), "releasing device handles");
    }
}

/// Runs CRC-verified transmissions over a device set
pub struct Tester<D, R = StdRng> {
    driver: D,
    rng: R,
    devices: Vec<String>,
    settings: LinkSettings,
}

impl<D: LinkDriver> Tester<D, StdRng> {
    /// Create a tester with an entropy-seeded generator
    pub fn new(driver: D, devices: Vec<String>, settings: LinkSettings) -> Self {
        Self::with_rng(driver, StdRng::from_entropy(), devices, settings)
    }
}

impl<D: LinkDriver, R: Rng> Tester<D, R> {
    /// Create a tester with an explicit generator (seed it for reproducible payloads)
    pub fn with_rng(driver: D, rng: R, devices: Vec<String>, settings: LinkSettings) -> Self {
        Self {
            driver,
            rng,
            devices,
            settings,
        }
    }

    /// Devices in transmit order
    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    /// Link settings every device is opened with
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Give the driver back, e.g. to inspect a test double
    pub fn into_driver(self) -> D {
        self.driver
    }

    fn check(
        packet: &Packet,
        outcome: ReadOutcome,
        buf: &[u8],
    ) -> Result<(), VerificationFailure> {
        match outcome {
            ReadOutcome::TimedOut(received) => Err(VerificationFailure::TimedOut { received }),
            ReadOutcome::Complete(received) => packet.verify(&buf[..received]),
        }
    }

    fn run_round(&mut self, length: usize, speed: u32) -> Result<TransmissionResult, LinkError> {
        let mode = self.settings.receive_mode;
        let mut buf = vec![0u8; self.settings.rx_buffer_size];
        let mut latencies = Vec::with_capacity(self.devices.len());
        let mut session = Session::new(&self.devices);

        // A relay round needs every receiver listening before the first
        // write. In echo mode each device is opened at its own turn so it
        // does not pick up the frames of the devices before it.
        if mode == ReceiveMode::Relay {
            for index in 0..self.devices.len() {
                session.acquire(&mut self.driver, index, speed, &self.settings)?;
            }
        }

        for tx in 0..self.devices.len() {
            let packet = Packet::new(payload::generate(&mut self.rng, length));
            let frame = packet.to_bytes();
            let transmitter = &self.devices[tx];

            if frame.len() > buf.len() {
                let reason = VerificationFailure::ExceedsBuffer {
                    packet_len: frame.len(),
                    buffer_len: buf.len(),
                };
                warn!(device = %transmitter, speed, length, %reason, "transmission failed");
                return Ok(TransmissionResult::failed(latencies, transmitter, reason));
            }

            let target = self.settings.read_target(frame.len());
            let receivers: Vec<usize> = match mode {
                ReceiveMode::Echo => vec![tx],
                ReceiveMode::Relay => (0..self.devices.len()).filter(|&rx| rx != tx).collect(),
            };

            session.acquire(&mut self.driver, tx, speed, &self.settings)?;

            let start = Instant::now();
            session.write(tx, &frame)?;

            for rx in receivers {
                let outcome = session.read(rx, &mut buf, target)?;
                let elapsed = start.elapsed();
                let receiver = &self.devices[rx];

                if let Err(reason) = Self::check(&packet, outcome, &buf) {
                    warn!(
                        transmitter = %transmitter,
                        receiver = %receiver,
                        speed,
                        length,
                        %reason,
                        "transmission failed"
                    );
                    return Ok(TransmissionResult::failed(latencies, receiver, reason));
                }

                debug!(
                    transmitter = %transmitter,
                    receiver = %receiver,
                    speed,
                    length,
                    latency_us = elapsed.as_micros() as u64,
                    "packet verified"
                );
                latencies.push(elapsed);
            }
        }

        Ok(TransmissionResult::passed(latencies))
    }
}

impl<D: LinkDriver, R: Rng> Transmit for Tester<D, R> {
    fn transmit(&mut self, length: usize, speed: u32) -> Result<TransmissionResult, LinkError> {
        self.run_round(length, speed)
    }
}
