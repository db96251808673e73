//! Pump controller commands
//!
//! Every command is an ASCII line terminated by `\r\n`; the controller
//! answers each one with a single line.

use super::{validate_voltages, Voltages, MAX_FREQUENCY_HZ};
use crate::error::{MolcommError, Result};
use std::fmt;

/// Identifier the controller reports for `ID`
pub const DEVICE_ID: &str = "PocketLoCPumpController";

/// Four voltages already checked against [`super::MAX_VOLTAGE`]
///
/// Only [`PumpCommand::set_voltages`] builds one, so every `PA` frame carries
/// three-digit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckedVoltages(Voltages);

impl CheckedVoltages {
    pub fn get(&self) -> Voltages {
        self.0
    }
}

/// One controller command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpCommand {
    /// `ID` - ask for the device identifier
    Identify,
    /// `SELECTQUADDRIVER` - use the four-channel high driver
    SelectQuadDriver,
    /// `PON` - enable the pump outputs
    PowerOn,
    /// `POFF` - disable the pump outputs
    PowerOff,
    /// `PA<aaa>#<bbb>#<ccc>#<ddd>` - set all four voltages
    SetVoltages(CheckedVoltages),
    /// `F<hz>` - set the drive frequency
    SetFrequency(u16),
}

impl PumpCommand {
    /// Command with voltages checked against the controller range
    pub fn set_voltages(voltages: Voltages) -> Result<Self> {
        validate_voltages(&voltages)?;
        Ok(PumpCommand::SetVoltages(CheckedVoltages(voltages)))
    }

    /// Command with the frequency checked against the controller range
    pub fn set_frequency(hz: u16) -> Result<Self> {
        if hz > MAX_FREQUENCY_HZ {
            return Err(MolcommError::InvalidParameter(format!(
                "Frequency {} Hz exceeds {} Hz",
                hz, MAX_FREQUENCY_HZ
            )));
        }
        Ok(PumpCommand::SetFrequency(hz))
    }

    /// Wire bytes including the line terminator
    pub fn encode(&self) -> Vec<u8> {
        format!("{}\r\n", self).into_bytes()
    }
}

impl fmt::Display for PumpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpCommand::Identify => write!(f, "ID"),
            PumpCommand::SelectQuadDriver => write!(f, "SELECTQUADDRIVER"),
            PumpCommand::PowerOn => write!(f, "PON"),
            PumpCommand::PowerOff => write!(f, "POFF"),
            PumpCommand::SetVoltages(CheckedVoltages([a, b, c, d])) => {
                write!(f, "PA{:03}#{:03}#{:03}#{:03}", a, b, c, d)
            }
            PumpCommand::SetFrequency(hz) => write!(f, "F{}", hz),
        }
    }
}
