//! Serial port handling
//!
//! Opens real devices through `serialport` with fixed 8N1 framing.

use serialport::{DataBits, FlowControl, Parity, SerialPortType, StopBits};
use std::time::Duration;

use super::{Link, LinkDriver, LinkError};
use crate::config::LinkSettings;

/// Deadline used when the configuration asks for no read deadline
const NO_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

/// A serial port found on this machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,
    /// Human readable description of the adapter, if known
    pub description: Option<String>,
}

fn describe(port_type: &SerialPortType) -> Option<String> {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let mut text = format!("USB {:04x}:{:04x}", usb.vid, usb.pid);
            if let Some(product) = &usb.product {
                text.push(' ');
                text.push_str(product);
            }
            Some(text)
        }
        SerialPortType::PciPort => Some("PCI".to_string()),
        SerialPortType::BluetoothPort => Some("Bluetooth".to_string()),
        SerialPortType::Unknown => None,
    }
}

/// Ordering for port names: ttyACM first, then ttyUSB, each numerically,
/// then everything else by name
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    for (rank, prefix) in [(0u8, "ttyACM"), (1u8, "ttyUSB")] {
        if let Some(rest) = basename.strip_prefix(prefix) {
            let num = rest.parse::<usize>().unwrap_or(usize::MAX);
            return (rank, num, basename.to_string());
        }
    }
    (2, 0, basename.to_string())
}

/// List serial ports in a stable order
pub fn list_ports() -> Result<Vec<PortInfo>, LinkError> {
    let found = serialport::available_ports().map_err(|e| LinkError::Io(e.into()))?;
    let mut ports: Vec<PortInfo> = found
        .into_iter()
        .map(|info| PortInfo {
            description: describe(&info.port_type),
            name: info.port_name,
        })
        .collect();
    ports.sort_by_key(|p| port_sort_key(&p.name));
    ports.dedup_by(|a, b| a.name == b.name);
    Ok(ports)
}

/// Driver for real serial hardware
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialDriver;

impl SerialDriver {
    /// Create a new serial driver
    pub fn new() -> Self {
        Self
    }
}

impl LinkDriver for SerialDriver {
    fn open(
        &mut self,
        device: &str,
        baud_rate: u32,
        settings: &LinkSettings,
    ) -> Result<Box<dyn Link>, LinkError> {
        let timeout = settings.read_timeout().unwrap_or(NO_DEADLINE);

        let port = serialport::new(device, baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| LinkError::Open {
                device: device.to_string(),
                reason: e.to_string(),
            })?;

        if settings.clear_on_open {
            port.clear(serialport::ClearBuffer::All)
                .map_err(|e| LinkError::Open {
                    device: device.to_string(),
                    reason: format!("could not clear buffers: {e}"),
                })?;
        }

        tracing::trace!(device, baud_rate, ?timeout, "opened serial port");
        Ok(Box::new(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_sorting() {
        let mut names = vec![
            "/dev/ttyUSB1",
            "/dev/ttyACM1",
            "/dev/ttyS0",
            "/dev/ttyUSB0",
            "/dev/ttyACM10",
            "/dev/ttyACM0",
        ];
        names.sort_by_key(|n| port_sort_key(n));

        assert_eq!(
            names,
            vec![
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/ttyACM10",
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/ttyS0",
            ]
        );
    }

    #[test]
    fn test_missing_port_fails_to_open() {
        let mut driver = SerialDriver::new();
        let result = driver.open(
            "/dev/linkprobe-does-not-exist",
            9600,
            &LinkSettings::default(),
        );

        match result {
            Err(LinkError::Open { device, .. }) => {
                assert_eq!(device, "/dev/linkprobe-does-not-exist")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opened a port that does not exist"),
        }
    }
}
