//! Command-line interface

use clap::{ArgAction, Parser, ValueEnum};
use linkprobe_core::config::{ConfigError, ProbeConfig, ReadPolicy, ReceiveMode};
use std::path::PathBuf;

/// Measure a serial link for its highest reliable baud rate, largest reliable
/// packet and round-trip latency
#[derive(Parser, Debug, Clone)]
#[command(name = "linkprobe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// List serial ports on this machine and exit
    #[arg(long)]
    pub list_ports: bool,

    /// Devices on the bus, in transmit order (e.g. /dev/ttyUSB0 COM15)
    pub devices: Vec<String>,

    /// JSON configuration file; flags override its values
    #[arg(short, long, env = "LINKPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Lowest baud rate tried
    #[arg(long)]
    pub min_speed: Option<u32>,

    /// Highest baud rate tried
    #[arg(long)]
    pub max_speed: Option<u32>,

    /// Shortest payload tried by the length search
    #[arg(long)]
    pub min_length: Option<usize>,

    /// Longest payload tried by the length search
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Payload length used during the speed search
    #[arg(long)]
    pub probe_length: Option<usize>,

    /// Payload length of the first delay profile
    #[arg(long)]
    pub short_length: Option<usize>,

    /// Transmissions per delay profile
    #[arg(short = 'n', long)]
    pub samples: Option<usize>,

    /// Read deadline in milliseconds
    #[arg(long, conflicts_with = "no_timeout")]
    pub timeout_ms: Option<u64>,

    /// Block on reads for as long as the driver allows
    #[arg(long)]
    pub no_timeout: bool,

    /// Receive buffer size in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// How much of a response to wait for
    #[arg(long, value_enum)]
    pub read_policy: Option<ReadPolicyArg>,

    /// Which devices read back a transmitted packet
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Run against a simulated bus instead of real ports
    #[arg(long)]
    pub simulate: bool,

    /// Highest reliable baud rate of the simulated bus
    #[arg(long, default_value_t = 115_200)]
    pub sim_max_baud: u32,

    /// Largest reliable frame of the simulated bus, in bytes
    #[arg(long, default_value_t = 4096)]
    pub sim_max_frame: usize,

    /// Seed for payloads (and the simulated bus), for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPolicyArg {
    /// Stop once the minimum read size has arrived
    Single,
    /// Wait for the whole packet
    Fill,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Each device reads back its own transmission
    Echo,
    /// Every other device reads each transmission
    Relay,
}

impl From<ReadPolicyArg> for ReadPolicy {
    fn from(arg: ReadPolicyArg) -> Self {
        match arg {
            ReadPolicyArg::Single => ReadPolicy::Single,
            ReadPolicyArg::Fill => ReadPolicy::Fill,
        }
    }
}

impl From<ModeArg> for ReceiveMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Echo => ReceiveMode::Echo,
            ModeArg::Relay => ReceiveMode::Relay,
        }
    }
}

impl Cli {
    /// Default log filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "linkprobe=warn,linkprobe_core=warn",
            (false, 0) => "linkprobe=info,linkprobe_core=info",
            (false, 1) => "linkprobe=debug,linkprobe_core=debug",
            (false, _) => "linkprobe=trace,linkprobe_core=trace",
        }
    }

    /// Build the run configuration: file first, then flags on top
    pub fn to_config(&self) -> Result<ProbeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::from_file(path)?,
            None => ProbeConfig::default(),
        };

        if !self.devices.is_empty() {
            config.devices = self.devices.clone();
        }
        if let Some(v) = self.min_speed {
            config.speed.min = v;
        }
        if let Some(v) = self.max_speed {
            config.speed.max = v;
        }
        if let Some(v) = self.min_length {
            config.length.min = v;
        }
        if let Some(v) = self.max_length {
            config.length.max = v;
        }
        if let Some(v) = self.probe_length {
            config.probe_length = v;
        }
        if let Some(v) = self.short_length {
            config.short_length = v;
        }
        if let Some(v) = self.samples {
            config.samples = v;
        }
        if let Some(v) = self.timeout_ms {
            config.link.read_timeout_ms = Some(v);
        }
        if self.no_timeout {
            config.link.read_timeout_ms = None;
        }
        if let Some(v) = self.buffer_size {
            config.link.rx_buffer_size = v;
        }
        if let Some(v) = self.read_policy {
            config.link.read_policy = v.into();
        }
        if let Some(v) = self.mode {
            config.link.receive_mode = v.into();
        }

        // Simulated ports only loop back to themselves
        if self.simulate && config.link.receive_mode == ReceiveMode::Relay {
            return Err(ConfigError::Invalid(
                "the simulated bus only supports echo mode".to_string(),
            ));
        }

        config.validate()?;
        Ok(config)
    }
}
