//! linkprobe - serial link envelope tester
//!
//! Finds the highest baud rate at which every device on the bus verifies a
//! CRC-tagged packet, the largest packet that survives at that rate, and the
//! write-to-read latency.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use linkprobe_core::config::{ConfigError, ProbeConfig};
use linkprobe_core::probe::{self, ProbeReport};
use linkprobe_core::protocol::{list_ports, LinkDriver, SerialDriver};
use linkprobe_core::simulated::{BusModel, SimulatedDriver};
use linkprobe_core::tester::Tester;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if e.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.list_ports {
        let ports = list_ports().context("could not enumerate serial ports")?;
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            match port.description {
                Some(desc) => println!("{}\t{}", port.name, desc),
                None => println!("{}", port.name),
            }
        }
        return Ok(());
    }

    let config = cli.to_config().context("invalid configuration")?;

    let report = if cli.simulate {
        let model = BusModel {
            max_baud: cli.sim_max_baud,
            max_frame: cli.sim_max_frame,
            ..BusModel::default()
        };
        let driver = match cli.seed {
            Some(seed) => SimulatedDriver::with_seed(model, seed),
            None => SimulatedDriver::new(model),
        };
        tracing::info!(
            max_baud = cli.sim_max_baud,
            max_frame = cli.sim_max_frame,
            "using simulated bus"
        );
        probe_with(&config, driver, cli.seed)?
    } else {
        probe_with(&config, SerialDriver::new(), cli.seed)?
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn probe_with<D: LinkDriver>(
    config: &ProbeConfig,
    driver: D,
    seed: Option<u64>,
) -> Result<ProbeReport> {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut tester = Tester::with_rng(driver, rng, config.devices.clone(), config.link.clone());
    probe::run(config, &mut tester).context("run aborted")
}
