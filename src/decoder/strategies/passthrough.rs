use crate::decoder::strategy::DecoderStrategy;

/// Raw display only; every capability keeps its empty default
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl DecoderStrategy for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }
}
