//! Run configuration
//!
//! Everything a run needs: the device set, the search bounds and the way each
//! device is read. Loadable from JSON; every field has a default so a config
//! file only needs to name what it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{DEFAULT_TIMEOUT_MS, MIN_READ_SIZE, RX_BUFFER_SIZE};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How much of the response a single read waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadPolicy {
    /// Return as soon as `min_read` bytes have arrived
    #[default]
    Single,
    /// Keep reading until the whole packet has arrived
    Fill,
}

/// Which devices read back a transmitted packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiveMode {
    /// The transmitting device reads its own response (loopback or echo peer)
    #[default]
    Echo,
    /// Every other device in the set reads what the transmitter sent
    Relay,
}

/// Per-device read behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Bytes that must arrive before a read counts as answered
    pub min_read: usize,
    /// Size of the receive buffer
    pub rx_buffer_size: usize,
    /// Read deadline; `None` blocks for as long as the driver allows
    pub read_timeout_ms: Option<u64>,
    /// One read per response, or keep reading until the frame is in
    pub read_policy: ReadPolicy,
    /// Which devices read back a transmitted packet
    pub receive_mode: ReceiveMode,
    /// Discard stale bytes right after opening a device
    pub clear_on_open: bool,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            min_read: MIN_READ_SIZE,
            rx_buffer_size: RX_BUFFER_SIZE,
            read_timeout_ms: Some(DEFAULT_TIMEOUT_MS),
            read_policy: ReadPolicy::Single,
            receive_mode: ReceiveMode::Echo,
            clear_on_open: true,
        }
    }
}

impl LinkSettings {
    /// Read deadline as a duration
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// Number of bytes a read should wait for, given the packet it answers
    pub fn read_target(&self, packet_len: usize) -> usize {
        match self.read_policy {
            ReadPolicy::Single => self.min_read.min(packet_len),
            ReadPolicy::Fill => packet_len,
        }
    }
}

/// Inclusive baud rate bounds for the speed search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedRange {
    /// Lowest baud rate tried
    pub min: u32,
    /// Highest baud rate tried
    pub max: u32,
}

impl Default for SpeedRange {
    fn default() -> Self {
        Self {
            min: 9600,
            max: 1_000_000,
        }
    }
}

/// Inclusive payload length bounds for the length search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthRange {
    /// Shortest payload tried
    pub min: usize,
    /// Longest payload tried
    pub max: usize,
}

impl Default for LengthRange {
    fn default() -> Self {
        Self {
            min: 100,
            max: 100_000,
        }
    }
}

/// A complete envelope run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Devices sharing the bus, in transmit order
    pub devices: Vec<String>,
    /// Baud rates the speed search covers
    pub speed: SpeedRange,
    /// Payload lengths the length search covers
    pub length: LengthRange,
    /// Payload length used while searching for speed
    pub probe_length: usize,
    /// Payload length of the first delay profile
    pub short_length: usize,
    /// Transmissions per delay profile
    pub samples: usize,
    /// How every device is opened and read
    pub link: LinkSettings,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            speed: SpeedRange::default(),
            length: LengthRange::default(),
            probe_length: 20,
            short_length: 10,
            samples: 10,
            link: LinkSettings::default(),
        }
    }
}

impl ProbeConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Check the configuration before any device is touched
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Invalid("no devices given".to_string()));
        }
        if let Some(dup) = self
            .devices
            .iter()
            .enumerate()
            .find(|&(i, d)| self.devices[..i].contains(d))
            .map(|(_, d)| d)
        {
            return Err(ConfigError::Invalid(format!("device {dup} listed twice")));
        }
        if self.speed.min == 0 {
            return Err(ConfigError::Invalid(
                "minimum speed must be greater than zero".to_string(),
            ));
        }
        if self.link.min_read == 0 {
            return Err(ConfigError::Invalid(
                "min_read must be greater than zero".to_string(),
            ));
        }
        if self.link.rx_buffer_size < self.link.min_read {
            return Err(ConfigError::Invalid(format!(
                "receive buffer ({} bytes) is smaller than min_read ({} bytes)",
                self.link.rx_buffer_size, self.link.min_read
            )));
        }
        if self.link.receive_mode == ReceiveMode::Relay && self.devices.len() < 2 {
            return Err(ConfigError::Invalid(
                "relay mode needs at least two devices".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn with_devices(devices: &[&str]) -> ProbeConfig {
        ProbeConfig {
            devices: devices.iter().map(|d| d.to_string()).collect(),
            ..ProbeConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = ProbeConfig::default();
        assert_eq!(config.speed, SpeedRange { min: 9600, max: 1_000_000 });
        assert_eq!(config.length, LengthRange { min: 100, max: 100_000 });
        assert_eq!(config.link.min_read, 4);
        assert_eq!(config.link.rx_buffer_size, 10_000);
        assert_eq!(config.link.read_timeout(), Some(Duration::from_millis(2000)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ProbeConfig = serde_json::from_str(
            r#"{ "devices": ["/dev/ttyUSB0"], "speed": { "min": 1200, "max": 57600 },
                 "link": { "receive_mode": "echo", "read_timeout_ms": null } }"#,
        )
        .unwrap();

        assert_eq!(config.devices, vec!["/dev/ttyUSB0".to_string()]);
        assert_eq!(config.speed.max, 57600);
        assert_eq!(config.samples, 10);
        assert_eq!(config.link.read_timeout(), None);
        assert_eq!(config.link.min_read, 4);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "devices": ["COM15", "COM16"],
                "samples": 3,
                "link": {{ "receive_mode": "relay" }}
            }}"#
        )
        .unwrap();

        let config = ProbeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.samples, 3);
        assert_eq!(config.link.receive_mode, ReceiveMode::Relay);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ devices: ").unwrap();

        assert!(matches!(
            ProbeConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_rejects() {
        assert!(ProbeConfig::default().validate().is_err());

        let mut zero_speed = with_devices(&["a"]);
        zero_speed.speed.min = 0;
        assert!(zero_speed.validate().is_err());

        assert!(with_devices(&["a", "a"]).validate().is_err());

        let mut relay = with_devices(&["a"]);
        relay.link.receive_mode = ReceiveMode::Relay;
        assert!(relay.validate().is_err());

        let mut tiny_buffer = with_devices(&["a"]);
        tiny_buffer.link.rx_buffer_size = 2;
        assert!(tiny_buffer.validate().is_err());
    }

    #[test]
    fn test_read_target() {
        let mut settings = LinkSettings::default();
        assert_eq!(settings.read_target(30), 4);
        assert_eq!(settings.read_target(1), 1);

        settings.read_policy = ReadPolicy::Fill;
        assert_eq!(settings.read_target(30), 30);
    }
}
