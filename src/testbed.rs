//! Testbed: at most one decoder and one pump transmitter
//!
//! The testbed never drives itself; whoever displays the decode calls
//! [`Testbed::decode`] at its own cadence.

use crate::actuation::{dry_run_controller, PumpTransmitter};
use crate::config::{DecoderConfig, TransmitterConfig, TransmitterLink};
use crate::decoder::{DecodePipeline, DecodedSnapshot};
use crate::error::{MolcommError, Result, ResultExt};
use crate::transport::{SerialTransport, Transport};
use crate::types::{DecoderState, LandmarkInfo, ReceiverInfo};
use std::sync::Arc;

/// Transmitter over whichever transport the config selected
pub type SharedTransmitter = Arc<PumpTransmitter<Box<dyn Transport>>>;

#[derive(Default)]
pub struct Testbed {
    decoder: Option<DecodePipeline>,
    transmitter: Option<SharedTransmitter>,
}

impl Testbed {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Decoder ====================

    /// Attach a decoder from config, replacing the current one
    ///
    /// On failure the previous decoder is already gone.
    pub fn add_decoder(&mut self, config: &DecoderConfig) -> Result<()> {
        self.remove_decoder();
        let pipeline = DecodePipeline::attach(config)
            .with_context(|| format!("Attaching '{}' decoder", config.kind.name()))?;
        self.decoder = Some(pipeline);
        Ok(())
    }

    /// Attach a pipeline built by the caller, replacing the current one
    pub fn add_decoder_pipeline(&mut self, pipeline: DecodePipeline) {
        self.remove_decoder();
        self.decoder = Some(pipeline);
    }

    /// Stop and drop the decoder; returns whether there was one
    pub fn remove_decoder(&mut self) -> bool {
        match self.decoder.take() {
            Some(pipeline) => {
                tracing::info!("Removing decoder '{}'", pipeline.strategy_name());
                drop(pipeline);
                true
            }
            None => false,
        }
    }

    pub fn decoder(&self) -> Option<&DecodePipeline> {
        self.decoder.as_ref()
    }

    pub fn decoder_mut(&mut self) -> Option<&mut DecodePipeline> {
        self.decoder.as_mut()
    }

    pub fn decoder_state(&self) -> Option<DecoderState> {
        self.decoder.as_ref().map(DecodePipeline::state)
    }

    pub fn start(&mut self) -> Result<()> {
        self.require_decoder()?.start()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.require_decoder()?.stop()
    }

    /// Run one decode cycle; `None` without a decoder
    pub fn decode(&mut self) -> Result<Option<Arc<DecodedSnapshot>>> {
        self.decoder.as_mut().map(DecodePipeline::decode).transpose()
    }

    /// Latest snapshot; `None` without a decoder
    pub fn get_decoded(&self) -> Option<Arc<DecodedSnapshot>> {
        self.decoder.as_ref().map(DecodePipeline::get_decoded)
    }

    pub fn get_receiver_info(&self) -> Option<&[ReceiverInfo]> {
        self.decoder.as_ref().map(DecodePipeline::get_receiver_info)
    }

    pub fn get_landmark_info(&self) -> Option<&LandmarkInfo> {
        self.decoder.as_ref().map(DecodePipeline::get_landmark_info)
    }

    fn require_decoder(&mut self) -> Result<&mut DecodePipeline> {
        self.decoder
            .as_mut()
            .ok_or_else(|| MolcommError::InvalidState("No decoder attached".to_string()))
    }

    // ==================== Transmitter ====================

    /// Connect the pump controller, replacing the current one
    pub fn add_transmitter(&mut self, config: &TransmitterConfig) -> Result<SharedTransmitter> {
        self.remove_transmitter()?;

        let transport: Box<dyn Transport> = match &config.link {
            TransmitterLink::Serial(serial) => Box::new(
                SerialTransport::open(serial)
                    .with_context(|| format!("Connecting pump controller on {}", serial.port))?,
            ),
            TransmitterLink::DryRun => {
                tracing::info!("Using dry-run pump controller");
                Box::new(dry_run_controller())
            }
        };

        let transmitter = Arc::new(PumpTransmitter::connect(transport)?);
        self.transmitter = Some(Arc::clone(&transmitter));
        Ok(transmitter)
    }

    /// Attach a transmitter built by the caller, replacing the current one
    pub fn add_transmitter_instance(&mut self, transmitter: SharedTransmitter) -> Result<()> {
        self.remove_transmitter()?;
        self.transmitter = Some(transmitter);
        Ok(())
    }

    pub fn transmitter(&self) -> Option<SharedTransmitter> {
        self.transmitter.clone()
    }

    /// Power off and drop the transmitter
    pub fn remove_transmitter(&mut self) -> Result<()> {
        match self.transmitter.take() {
            Some(transmitter) => transmitter.shutdown(),
            None => Ok(()),
        }
    }

    /// Stop everything; errors are logged
    pub fn shutdown(&mut self) {
        self.remove_decoder();
        if let Err(e) = self.remove_transmitter() {
            tracing::warn!("Error shutting down pump transmitter: {}", e);
        }
    }
}

impl Drop for Testbed {
    fn drop(&mut self) {
        self.shutdown();
    }
}
