//! Micropump actuation
//!
//! A four-channel pump controller is driven with voltage snapshots. A pulse
//! switches every channel on after its own delay and off again after a common
//! duration; [`timeline`] turns that into a minimal ordered list of
//! snapshots and [`scheduler`] replays it in real time.
//!
//! # Main Types
//!
//! - [`PulseSpec`] - On/off voltages, per-channel delays and duration
//! - [`Timeline`] - Ordered voltage snapshots with their start offsets
//! - [`ActuationScheduler`] - Real-time replay with cancellation
//! - [`PumpTransmitter`] - Wire protocol of the pump controller
//! - [`PumpCommand`] - One encoded controller command

pub mod command;
pub mod scheduler;
pub mod timeline;
pub mod transmitter;

pub use command::{CheckedVoltages, PumpCommand};
pub use scheduler::{ActuationScheduler, ReplayOutcome, Sleeper, ThreadSleeper};
pub use timeline::{Timeline, TimelineStep};
pub use transmitter::{dry_run_controller, PumpTransmitter, StopHandle};

use crate::error::{MolcommError, Result};
use serde::{Deserialize, Serialize};

/// Number of pump channels on the controller
pub const CHANNELS: usize = 4;

/// Highest voltage the controller accepts
pub const MAX_VOLTAGE: u16 = 250;

/// Highest drive frequency in Hz the controller accepts
pub const MAX_FREQUENCY_HZ: u16 = 850;

/// One voltage per pump channel
pub type Voltages = [u16; CHANNELS];

/// A pulse across all four channels
///
/// Channel `c` switches to `on_voltages[c]` at `delays_ms[c]` and back to
/// `off_voltages[c]` at `delays_ms[c] + duration_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseSpec {
    pub on_voltages: Voltages,
    pub off_voltages: Voltages,
    pub delays_ms: [u64; CHANNELS],
    pub duration_ms: u64,
}

impl PulseSpec {
    /// Pulse with the same start time on every channel
    pub fn simultaneous(on_voltages: Voltages, off_voltages: Voltages, duration_ms: u64) -> Self {
        Self {
            on_voltages,
            off_voltages,
            delays_ms: [0; CHANNELS],
            duration_ms,
        }
    }

    /// Reject voltages the controller cannot produce
    pub fn validate(&self) -> Result<()> {
        validate_voltages(&self.on_voltages)?;
        validate_voltages(&self.off_voltages)
    }
}

/// A single change of one channel at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoltageEvent {
    pub time_offset_ms: u64,
    pub channel: usize,
    pub new_voltage: u16,
}

pub(crate) fn validate_voltages(voltages: &Voltages) -> Result<()> {
    match voltages.iter().position(|&v| v > MAX_VOLTAGE) {
        Some(channel) => Err(MolcommError::InvalidParameter(format!(
            "Voltage {} on channel {} exceeds {}",
            voltages[channel],
            channel + 1,
            MAX_VOLTAGE
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_voltage_range() {
        assert!(PulseSpec::simultaneous([250; 4], [0; 4], 10).validate().is_ok());

        let err = PulseSpec::simultaneous([0, 0, 251, 0], [0; 4], 10)
            .validate()
            .unwrap_err();
        assert!(matches!(err, MolcommError::InvalidParameter(_)));
        assert!(err.to_string().contains("channel 3"));

        assert!(PulseSpec::simultaneous([0; 4], [300; 4], 10).validate().is_err());
    }
}
