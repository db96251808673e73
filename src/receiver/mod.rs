//! Receivers: blocking sources of timestamped sample vectors
//!
//! A receiver is owned by exactly one acquisition thread while the decoder is
//! active and handed back to the pipeline when it stops.
//!
//! - [`SimulatedReceiver`] - pattern generator, no hardware needed
//! - [`SerialReceiver`] - separated values streamed over a [`Transport`]
//!
//! [`Transport`]: crate::transport::Transport

pub mod acquisition;
pub mod buffer;
pub mod serial;
pub mod simulated;

pub use acquisition::{AcquisitionHandle, AcquisitionTask, SpawnFailure};
pub use buffer::{sample_channel, SampleBuffer, SampleWriter};
pub use serial::SerialReceiver;
pub use simulated::{SignalPattern, SimulatedReceiver};

use crate::config::ReceiverConfig;
use crate::error::{Result, ResultExt};
use crate::transport::SerialTransport;
use crate::types::Sample;
use std::time::{Duration, Instant};

/// Blocking source of samples
pub trait Receiver: Send {
    /// Type identifier used for generated descriptions
    fn kind(&self) -> &str;

    /// One name per channel of the produced value vectors
    fn channel_names(&self) -> Vec<String>;

    /// Prepare for acquisition; timestamps are measured from `epoch`
    fn open(&mut self, epoch: Instant) -> Result<()>;

    /// Wait at most `timeout` for the next sample
    ///
    /// Returns `Ok(None)` when no sample arrived in time.
    fn read(&mut self, timeout: Duration) -> Result<Option<Sample>>;

    /// Release hardware; called when the acquisition thread exits
    fn close(&mut self) {}
}

/// Construct a receiver from its config
///
/// Serial ports are opened here, so an unreachable port fails the attach.
pub fn build_receiver(config: &ReceiverConfig) -> Result<Box<dyn Receiver>> {
    match config {
        ReceiverConfig::Simulated(sim) => Ok(Box::new(SimulatedReceiver::from_config(sim)?)),
        ReceiverConfig::Serial(serial) => {
            let transport = SerialTransport::open(&serial.serial)
                .with_context(|| format!("Opening receiver on {}", serial.serial.port))?;
            Ok(Box::new(SerialReceiver::new(
                transport,
                serial.channel_names.clone(),
                serial.separator,
            )))
        }
    }
}
