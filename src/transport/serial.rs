//! Serial line transport
//!
//! Wraps a `serialport` handle and splits the incoming byte stream into
//! lines. Bytes received after a line terminator are kept for the next
//! `read_line` call.

use crate::config::SerialConfig;
use crate::error::{MolcommError, Result};
use crate::transport::{trim_line_ending, Transport};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

/// Upper bound for a single blocking read inside `read_line`
const READ_SLICE: Duration = Duration::from_millis(20);

/// Transport over a serial port
///
/// `close` releases the port; any later I/O is a transport error.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    port_name: String,
    /// Bytes received but not yet returned as a line
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Open the configured port
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()
            .map_err(|e| {
                MolcommError::Transport(format!("Cannot connect to port {}: {}", config.port, e))
            })?;

        tracing::info!(
            "Opened serial port {} at {} baud",
            config.port,
            config.baud_rate
        );

        Ok(Self::from_port(port, config.port.clone()))
    }

    /// Wrap an already opened port
    pub fn from_port(port: Box<dyn SerialPort>, port_name: impl Into<String>) -> Self {
        Self {
            port: Some(port),
            port_name: port_name.into(),
            pending: Vec::with_capacity(64),
        }
    }

    /// Whether the port is still held
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Name of the underlying port
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(trim_line_ending(line))
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(port) = self.port.as_mut() else {
            return Err(closed(&self.port_name));
        };
        port.write_all(bytes)
            .and_then(|_| port.flush())
            .map_err(|e| MolcommError::Transport(format!("Write to {} failed: {}", self.port_name, e)))
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 256];

        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }

            let Some(port) = self.port.as_mut() else {
                return Err(closed(&self.port_name));
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            port.set_timeout(remaining.min(READ_SLICE))?;
            match port.read(&mut buf) {
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut => {}
                Err(e) => {
                    return Err(MolcommError::Transport(format!(
                        "Read from {} failed: {}",
                        self.port_name, e
                    )))
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut port) = self.port.take() {
            let _ = port.flush();
            self.pending.clear();
            tracing::info!("Closed serial port {}", self.port_name);
        }
    }
}

fn closed(port_name: &str) -> MolcommError {
    MolcommError::Transport(format!("Port {} is closed", port_name))
}
