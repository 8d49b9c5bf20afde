use crate::config::SERIAL_TIMEOUT;
use crate::protocol::{self, SERVO_ELBOW, SERVO_SHOULDER, SERVO_WRIST};
use crate::{ArmError, Result};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An open byte channel to the arm controller.
pub trait SerialLink: Write + Send {
    /// Whether the channel can still accept writes.
    fn is_open(&self) -> bool {
        true
    }
}

/// Opens serial links by port name.
pub trait SerialConnector: Send {
    fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialLink>>;
}

/// Servo command sender over a serial link.
///
/// Sends are dropped with a warning while disconnected; a lost link never
/// takes down the control loop.
pub struct ServoTransport {
    connector: Box<dyn SerialConnector>,
    link: Option<Box<dyn SerialLink>>,
    port: Option<String>,
}

impl ServoTransport {
    pub fn new(connector: Box<dyn SerialConnector>) -> Self {
        Self {
            connector,
            link: None,
            port: None,
        }
    }

    /// Open `port`, replacing any existing link. No retries.
    pub fn connect(&mut self, port: &str, baud_rate: u32) -> Result<()> {
        self.link = None;
        self.port = None;
        match self.connector.open(port, baud_rate, SERIAL_TIMEOUT) {
            Ok(link) => {
                log::info!("Connected to arm on {} at {} baud", port, baud_rate);
                self.link = Some(link);
                self.port = Some(port.to_string());
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to connect to arm on {}: {}", port, e);
                Err(e)
            }
        }
    }

    pub fn disconnect(&mut self) {
        let port = self.port.take();
        if self.link.take().is_some() {
            log::info!("Disconnected from {}", port.unwrap_or_default());
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(|l| l.is_open())
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    /// Send one servo command. The angle is clamped to [0, 180].
    pub fn send_servo(&mut self, servo_id: u8, angle: f64) -> Result<()> {
        let link = match self.link.as_mut() {
            Some(link) if link.is_open() => link,
            _ => {
                log::warn!("Arm not connected, dropping command for servo {}", servo_id);
                return Err(ArmError::NotConnected);
            }
        };
        let line = protocol::encode_command(servo_id, angle);
        link.write_all(line.as_bytes())?;
        link.flush()?;
        log::debug!("Sent: {}", line.trim_end());
        Ok(())
    }

    /// Send shoulder, elbow and wrist in that order.
    pub fn send_angles(&mut self, shoulder: f64, elbow: f64, wrist: f64) -> Result<()> {
        self.send_servo(SERVO_SHOULDER, shoulder)?;
        self.send_servo(SERVO_ELBOW, elbow)?;
        self.send_servo(SERVO_WRIST, wrist)?;
        log::debug!("Sent angles: S={:.0} E={:.0} W={:.0}", shoulder, elbow, wrist);
        Ok(())
    }
}

/// In-memory link that records every byte written to it.
///
/// Clones share the same buffer, so a caller can keep one handle for
/// inspection and hand another to [`ServoTransport`]. Used for dry runs.
#[derive(Debug, Clone, Default)]
pub struct CaptureLink {
    buffer: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl CaptureLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Written command lines, newline stripped.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Simulate the device going away.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

impl Write for CaptureLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "link closed",
            ));
        }
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SerialLink for CaptureLink {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Relaxed)
    }
}

/// Connector handing out a [`CaptureLink`] for any port.
///
/// Ports listed in `unavailable` fail to open, for exercising error paths.
#[derive(Debug, Clone, Default)]
pub struct CaptureConnector {
    pub link: CaptureLink,
    pub unavailable: Vec<String>,
}

impl CaptureConnector {
    pub fn new(link: CaptureLink) -> Self {
        Self {
            link,
            unavailable: Vec::new(),
        }
    }
}

impl SerialConnector for CaptureConnector {
    fn open(&self, port: &str, _baud_rate: u32, _timeout: Duration) -> Result<Box<dyn SerialLink>> {
        if self.unavailable.iter().any(|p| p == port) {
            return Err(ArmError::Connect {
                port: port.to_string(),
                reason: "port unavailable".into(),
            });
        }
        Ok(Box::new(self.link.clone()))
    }
}
