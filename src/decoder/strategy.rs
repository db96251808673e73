//! Decoder strategy abstraction
//!
//! Two-layer design, as for the pipeline steps:
//! - **`DecoderStrategy` trait** for strategies supplied by the caller.
//! - **`BuiltinDecoder` enum** for the strategies selectable from config.
//!
//! `AnyDecoder` wraps either so the pipeline handles both uniformly. Every
//! capability is optional; the defaults produce nothing.

use crate::config::DecoderKind;
use crate::decoder::strategies::{AmplitudeLevels, OnOffKeying, Passthrough};
use crate::error::Result;
use crate::types::{Landmark, ReceiverHistory, ReceiverInfo, SymbolValue};

/// Everything a strategy step may look at
///
/// `landmarks`, `intervals` and `values` hold this cycle's results of the
/// earlier steps; they are empty for the steps that run before them.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    /// Full history per receiver, in receiver index order
    pub receivers: &'a [ReceiverHistory],
    /// Descriptor per receiver
    pub receiver_info: &'a [ReceiverInfo],
    /// Names of the landmark sets the pipeline expects
    pub landmark_names: &'a [String],
    /// Landmarks of this cycle
    pub landmarks: &'a [Vec<Landmark>],
    /// Accepted symbol boundaries of this cycle
    pub intervals: &'a [f64],
    /// Accepted symbol values of this cycle
    pub values: &'a [SymbolValue],
    /// Intervals accepted in the previous cycle
    pub previous_intervals: &'a [f64],
    /// Values exposed in the previous cycle
    pub previous_values: &'a [SymbolValue],
    /// Sequence exposed in the previous cycle
    pub previous_sequence: &'a str,
    /// Decode cycle counter, 0 for the dry run at attach
    pub cycle: u64,
}

impl<'a> DecodeContext<'a> {
    /// Context with nothing decoded yet
    pub fn new(receivers: &'a [ReceiverHistory], receiver_info: &'a [ReceiverInfo]) -> Self {
        Self {
            receivers,
            receiver_info,
            landmark_names: &[],
            landmarks: &[],
            intervals: &[],
            values: &[],
            previous_intervals: &[],
            previous_values: &[],
            previous_sequence: "",
            cycle: 0,
        }
    }

    /// History of one receiver
    pub fn receiver(&self, index: usize) -> Option<&'a ReceiverHistory> {
        self.receivers.get(index)
    }
}

/// Trait for caller-supplied decode algorithms
pub trait DecoderStrategy: Send {
    /// Human-readable name
    fn name(&self) -> &str;

    /// Landmark set names used when the config names none
    fn default_landmark_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Check that the attached receivers fit this strategy
    fn validate(&self, _receivers: &[ReceiverInfo]) -> Result<()> {
        Ok(())
    }

    /// One list of landmarks per landmark set
    fn calculate_landmarks(&mut self, _ctx: &DecodeContext) -> Result<Vec<Vec<Landmark>>> {
        Ok(Vec::new())
    }

    /// Symbol boundaries; must extend the previous result
    fn calculate_symbol_intervals(&mut self, _ctx: &DecodeContext) -> Result<Vec<f64>> {
        Ok(Vec::new())
    }

    /// One value per slot between consecutive boundaries
    fn calculate_symbol_values(&mut self, _ctx: &DecodeContext) -> Result<Vec<SymbolValue>> {
        Ok(Vec::new())
    }

    /// Decoded message; must extend the previous result
    fn calculate_sequence(&mut self, _ctx: &DecodeContext) -> Result<String> {
        Ok(String::new())
    }
}

/// Enum dispatch for the built-in strategies
#[derive(Debug, Clone)]
pub enum BuiltinDecoder {
    Passthrough(Passthrough),
    OnOffKeying(OnOffKeying),
    AmplitudeLevels(AmplitudeLevels),
}

impl BuiltinDecoder {
    pub fn from_kind(kind: &DecoderKind) -> Self {
        match kind {
            DecoderKind::Passthrough => BuiltinDecoder::Passthrough(Passthrough),
            DecoderKind::OnOffKeying(config) => {
                BuiltinDecoder::OnOffKeying(OnOffKeying::new(config.clone()))
            }
            DecoderKind::AmplitudeLevels(config) => {
                BuiltinDecoder::AmplitudeLevels(AmplitudeLevels::new(config.clone()))
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BuiltinDecoder::Passthrough(d) => d.name(),
            BuiltinDecoder::OnOffKeying(d) => d.name(),
            BuiltinDecoder::AmplitudeLevels(d) => d.name(),
        }
    }

    pub fn default_landmark_names(&self) -> Vec<String> {
        match self {
            BuiltinDecoder::Passthrough(d) => d.default_landmark_names(),
            BuiltinDecoder::OnOffKeying(d) => d.default_landmark_names(),
            BuiltinDecoder::AmplitudeLevels(d) => d.default_landmark_names(),
        }
    }

    pub fn validate(&self, receivers: &[ReceiverInfo]) -> Result<()> {
        match self {
            BuiltinDecoder::Passthrough(d) => d.validate(receivers),
            BuiltinDecoder::OnOffKeying(d) => d.validate(receivers),
            BuiltinDecoder::AmplitudeLevels(d) => d.validate(receivers),
        }
    }

    pub fn calculate_landmarks(&mut self, ctx: &DecodeContext) -> Result<Vec<Vec<Landmark>>> {
        match self {
            BuiltinDecoder::Passthrough(d) => d.calculate_landmarks(ctx),
            BuiltinDecoder::OnOffKeying(d) => d.calculate_landmarks(ctx),
            BuiltinDecoder::AmplitudeLevels(d) => d.calculate_landmarks(ctx),
        }
    }

    pub fn calculate_symbol_intervals(&mut self, ctx: &DecodeContext) -> Result<Vec<f64>> {
        match self {
            BuiltinDecoder::Passthrough(d) => d.calculate_symbol_intervals(ctx),
            BuiltinDecoder::OnOffKeying(d) => d.calculate_symbol_intervals(ctx),
            BuiltinDecoder::AmplitudeLevels(d) => d.calculate_symbol_intervals(ctx),
        }
    }

    pub fn calculate_symbol_values(&mut self, ctx: &DecodeContext) -> Result<Vec<SymbolValue>> {
        match self {
            BuiltinDecoder::Passthrough(d) => d.calculate_symbol_values(ctx),
            BuiltinDecoder::OnOffKeying(d) => d.calculate_symbol_values(ctx),
            BuiltinDecoder::AmplitudeLevels(d) => d.calculate_symbol_values(ctx),
        }
    }

    pub fn calculate_sequence(&mut self, ctx: &DecodeContext) -> Result<String> {
        match self {
            BuiltinDecoder::Passthrough(d) => d.calculate_sequence(ctx),
            BuiltinDecoder::OnOffKeying(d) => d.calculate_sequence(ctx),
            BuiltinDecoder::AmplitudeLevels(d) => d.calculate_sequence(ctx),
        }
    }
}

/// Wrapper that holds either a built-in strategy or a plugin
pub enum AnyDecoder {
    Builtin(BuiltinDecoder),
    Plugin(Box<dyn DecoderStrategy>),
}

impl From<BuiltinDecoder> for AnyDecoder {
    fn from(decoder: BuiltinDecoder) -> Self {
        AnyDecoder::Builtin(decoder)
    }
}

impl From<Box<dyn DecoderStrategy>> for AnyDecoder {
    fn from(decoder: Box<dyn DecoderStrategy>) -> Self {
        AnyDecoder::Plugin(decoder)
    }
}

impl AnyDecoder {
    /// Wrap a caller-supplied strategy
    pub fn plugin(strategy: impl DecoderStrategy + 'static) -> Self {
        AnyDecoder::Plugin(Box::new(strategy))
    }

    pub fn name(&self) -> &str {
        match self {
            AnyDecoder::Builtin(d) => d.name(),
            AnyDecoder::Plugin(d) => d.name(),
        }
    }

    pub fn default_landmark_names(&self) -> Vec<String> {
        match self {
            AnyDecoder::Builtin(d) => d.default_landmark_names(),
            AnyDecoder::Plugin(d) => d.default_landmark_names(),
        }
    }

    pub fn validate(&self, receivers: &[ReceiverInfo]) -> Result<()> {
        match self {
            AnyDecoder::Builtin(d) => d.validate(receivers),
            AnyDecoder::Plugin(d) => d.validate(receivers),
        }
    }

    pub fn calculate_landmarks(&mut self, ctx: &DecodeContext) -> Result<Vec<Vec<Landmark>>> {
        match self {
            AnyDecoder::Builtin(d) => d.calculate_landmarks(ctx),
            AnyDecoder::Plugin(d) => d.calculate_landmarks(ctx),
        }
    }

    pub fn calculate_symbol_intervals(&mut self, ctx: &DecodeContext) -> Result<Vec<f64>> {
        match self {
            AnyDecoder::Builtin(d) => d.calculate_symbol_intervals(ctx),
            AnyDecoder::Plugin(d) => d.calculate_symbol_intervals(ctx),
        }
    }

    pub fn calculate_symbol_values(&mut self, ctx: &DecodeContext) -> Result<Vec<SymbolValue>> {
        match self {
            AnyDecoder::Builtin(d) => d.calculate_symbol_values(ctx),
            AnyDecoder::Plugin(d) => d.calculate_symbol_values(ctx),
        }
    }

    pub fn calculate_sequence(&mut self, ctx: &DecodeContext) -> Result<String> {
        match self {
            AnyDecoder::Builtin(d) => d.calculate_sequence(ctx),
            AnyDecoder::Plugin(d) => d.calculate_sequence(ctx),
        }
    }
}
