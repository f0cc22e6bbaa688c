//! Scripted serial bus shared by the integration tests

#![allow(dead_code)]

use linkprobe_core::config::LinkSettings;
use linkprobe_core::protocol::{Link, LinkDriver, LinkError};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

/// Who hears a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wiring {
    /// Every device's TX is looped back to its own RX
    Loopback,
    /// Every device hears every other device, but not itself
    Crossed,
    /// One shared line: every device hears every write, its own included
    SharedBus,
}

/// Misbehavior of a single device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Flip a bit in everything this device receives
    Corrupt,
    /// Never answer; reads time out
    Silent,
    /// Deliver at most this many bytes per read call
    Chunked(usize),
    FailOpen,
    FailWrite,
    FailRead,
}

#[derive(Default)]
pub struct BusState {
    inboxes: HashMap<String, VecDeque<u8>>,
    /// (device, baud) per open, in order
    pub opens: Vec<(String, u32)>,
    /// (device, frame) per write, in order
    pub writes: Vec<(String, Vec<u8>)>,
    /// Handles currently open
    pub open_handles: usize,
}

pub struct ScriptedDriver {
    wiring: Wiring,
    devices: Vec<String>,
    faults: HashMap<String, Fault>,
    /// Frames sent above this baud rate arrive corrupted
    max_baud: Option<u32>,
    state: Arc<Mutex<BusState>>,
}

impl ScriptedDriver {
    pub fn new(wiring: Wiring, devices: &[&str]) -> Self {
        Self {
            wiring,
            devices: devices.iter().map(|d| d.to_string()).collect(),
            faults: HashMap::new(),
            max_baud: None,
            state: Arc::new(Mutex::new(BusState::default())),
        }
    }

    pub fn fault(mut self, device: &str, fault: Fault) -> Self {
        self.faults.insert(device.to_string(), fault);
        self
    }

    pub fn max_baud(mut self, baud: u32) -> Self {
        self.max_baud = Some(baud);
        self
    }

    pub fn device_names(&self) -> Vec<String> {
        self.devices.clone()
    }

    pub fn state(&self) -> Arc<Mutex<BusState>> {
        Arc::clone(&self.state)
    }
}

impl LinkDriver for ScriptedDriver {
    fn open(
        &mut self,
        device: &str,
        baud_rate: u32,
        _settings: &LinkSettings,
    ) -> Result<Box<dyn Link>, LinkError> {
        let fault = self.faults.get(device).copied();
        if fault == Some(Fault::FailOpen) {
            return Err(LinkError::Open {
                device: device.to_string(),
                reason: "No such file or directory".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.opens.push((device.to_string(), baud_rate));
        state.open_handles += 1;
        // Fresh session, nothing left over from an earlier round
        state.inboxes.insert(device.to_string(), VecDeque::new());
        drop(state);

        let corrupt_all = self.max_baud.map(|max| baud_rate > max).unwrap_or(false);
        Ok(Box::new(ScriptedLink {
            name: device.to_string(),
            listeners: match self.wiring {
                Wiring::Loopback => vec![device.to_string()],
                Wiring::Crossed => self
                    .devices
                    .iter()
                    .filter(|d| d.as_str() != device)
                    .cloned()
                    .collect(),
                Wiring::SharedBus => self.devices.clone(),
            },
            fault,
            corrupt_all,
            state: Arc::clone(&self.state),
        }))
    }
}

struct ScriptedLink {
    name: String,
    listeners: Vec<String>,
    fault: Option<Fault>,
    corrupt_all: bool,
    state: Arc<Mutex<BusState>>,
}

impl Write for ScriptedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fault == Some(Fault::FailWrite) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write failed"));
        }
        let mut state = self.state.lock().unwrap();
        state.writes.push((self.name.clone(), buf.to_vec()));
        for listener in &self.listeners {
            state
                .inboxes
                .entry(listener.clone())
                .or_default()
                .extend(buf.iter().copied());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.fault {
            Some(Fault::FailRead) => {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "read failed"))
            }
            Some(Fault::Silent) => {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
            }
            _ => {}
        }

        let mut state = self.state.lock().unwrap();
        let inbox = state.inboxes.entry(self.name.clone()).or_default();
        if inbox.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"));
        }

        let limit = match self.fault {
            Some(Fault::Chunked(n)) => n,
            _ => usize::MAX,
        };
        let n = inbox.len().min(buf.len()).min(limit);
        for (i, byte) in inbox.drain(..n).enumerate() {
            buf[i] = byte;
        }
        if self.corrupt_all || self.fault == Some(Fault::Corrupt) {
            buf[0] ^= 0x01;
        }
        Ok(n)
    }
}

impl Drop for ScriptedLink {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.open_handles -= 1;
        }
    }
}
