//! Hardware serial ports through the `serialport` crate.

use crate::transport::{SerialConnector, SerialLink};
use crate::{ArmError, Result};
use std::io::Write;
use std::time::Duration;

/// List serial port names present on this machine.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(|e| ArmError::Connect {
        port: "*".into(),
        reason: e.to_string(),
    })?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Opens operating-system serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerial;

impl SerialConnector for SystemSerial {
    fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialLink>> {
        let handle = serialport::new(port, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| ArmError::Connect {
                port: port.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(SystemLink { handle }))
    }
}

struct SystemLink {
    handle: Box<dyn serialport::SerialPort>,
}

impl Write for SystemLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.handle.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.handle.flush()
    }
}

impl SerialLink for SystemLink {}
