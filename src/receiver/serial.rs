//! Line-oriented sensor receiver
//!
//! Each line carries one value per channel, separated by a configurable
//! character (e.g. `0.12,0.98,1.50`). The sample is stamped on arrival.

use crate::error::{MolcommError, Result};
use crate::receiver::Receiver;
use crate::transport::Transport;
use crate::types::Sample;
use std::time::{Duration, Instant};

/// Receiver parsing separated values from a transport
pub struct SerialReceiver<T: Transport> {
    transport: T,
    channel_names: Vec<String>,
    separator: char,
    epoch: Option<Instant>,
}

impl<T: Transport> SerialReceiver<T> {
    pub fn new(transport: T, channel_names: Vec<String>, separator: char) -> Self {
        Self {
            transport,
            channel_names,
            separator,
            epoch: None,
        }
    }

    /// Parse one line into channel values
    pub fn parse_line(&self, line: &[u8]) -> Result<Vec<f64>> {
        let text = std::str::from_utf8(line)
            .map_err(|e| MolcommError::Receiver(format!("Line is not UTF-8: {}", e)))?;

        let values = text
            .trim()
            .split(self.separator)
            .map(|field| {
                field.trim().parse::<f64>().map_err(|e| {
                    MolcommError::Receiver(format!("Bad value '{}': {}", field.trim(), e))
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        if values.len() != self.channel_names.len() {
            return Err(MolcommError::Receiver(format!(
                "Expected {} values, got {}",
                self.channel_names.len(),
                values.len()
            )));
        }

        Ok(values)
    }
}

impl<T: Transport> Receiver for SerialReceiver<T> {
    fn kind(&self) -> &str {
        "Serial"
    }

    fn channel_names(&self) -> Vec<String> {
        self.channel_names.clone()
    }

    fn open(&mut self, epoch: Instant) -> Result<()> {
        self.epoch = Some(epoch);
        Ok(())
    }

    fn read(&mut self, timeout: Duration) -> Result<Option<Sample>> {
        let epoch = self
            .epoch
            .ok_or_else(|| MolcommError::InvalidState("Serial receiver read before open".into()))?;

        let Some(line) = self.transport.read_line(timeout)? else {
            return Ok(None);
        };
        // Blank keep-alive lines carry no sample
        if line.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let values = self.parse_line(&line)?;
        Ok(Some(Sample::new(epoch.elapsed().as_secs_f64(), values)))
    }

    fn close(&mut self) {
        self.transport.close();
    }
}
