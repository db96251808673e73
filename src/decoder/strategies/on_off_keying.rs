//! On-off keying
//!
//! A slot carries a 1 when the mean concentration over the slot exceeds the
//! threshold and a 0 otherwise. The first rising edge on the first receiver
//! anchors the slot grid.

use super::{
    first_at_or_above, fixed_slot_boundaries, invalid, validate_channel,
    validate_symbol_duration, values_to_string, window_mean,
};
use crate::decoder::strategy::{DecodeContext, DecoderStrategy};
use crate::error::Result;
use crate::types::{Landmark, ReceiverInfo, SymbolValue};
use serde::{Deserialize, Serialize};

const NAME: &str = "on_off_keying";

/// Parameters of the on-off keying decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnOffKeyingConfig {
    /// Channel of the first receiver to decode
    #[serde(default)]
    pub channel: usize,
    /// Level separating a 0 from a 1
    pub threshold: f64,
    /// Length of one symbol slot in seconds
    pub symbol_duration_s: f64,
}

impl Default for OnOffKeyingConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            threshold: 0.5,
            symbol_duration_s: 1.0,
        }
    }
}

/// Binary threshold decoder
#[derive(Debug, Clone)]
pub struct OnOffKeying {
    config: OnOffKeyingConfig,
}

impl OnOffKeying {
    pub fn new(config: OnOffKeyingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OnOffKeyingConfig {
        &self.config
    }
}

impl DecoderStrategy for OnOffKeying {
    fn name(&self) -> &str {
        NAME
    }

    fn default_landmark_names(&self) -> Vec<String> {
        vec!["Rising edges".to_string(), "Falling edges".to_string()]
    }

    fn validate(&self, receivers: &[ReceiverInfo]) -> Result<()> {
        validate_channel(NAME, receivers, self.config.channel)?;
        validate_symbol_duration(NAME, self.config.symbol_duration_s)?;
        if !self.config.threshold.is_finite() {
            return Err(invalid(NAME, "threshold must be finite".to_string()));
        }
        Ok(())
    }

    fn calculate_landmarks(&mut self, ctx: &DecodeContext) -> Result<Vec<Vec<Landmark>>> {
        let Some(history) = ctx.receiver(0) else {
            return Ok(Vec::new());
        };
        let threshold = self.config.threshold;
        let mut rising = Vec::new();
        let mut falling = Vec::new();

        let mut previous: Option<f64> = None;
        for (t, value) in history.channel(self.config.channel) {
            if let Some(prev) = previous {
                if prev < threshold && value >= threshold {
                    rising.push(Landmark::new(t, value));
                } else if prev >= threshold && value < threshold {
                    falling.push(Landmark::new(t, value));
                }
            }
            previous = Some(value);
        }

        Ok(vec![rising, falling])
    }

    fn calculate_symbol_intervals(&mut self, ctx: &DecodeContext) -> Result<Vec<f64>> {
        let Some(history) = ctx.receiver(0) else {
            return Ok(Vec::new());
        };
        let (Some(anchor), Some(newest)) = (
            first_at_or_above(history, self.config.channel, self.config.threshold),
            history.last_timestamp(),
        ) else {
            return Ok(Vec::new());
        };
        Ok(fixed_slot_boundaries(anchor, self.config.symbol_duration_s, newest))
    }

    fn calculate_symbol_values(&mut self, ctx: &DecodeContext) -> Result<Vec<SymbolValue>> {
        let Some(history) = ctx.receiver(0) else {
            return Ok(Vec::new());
        };
        let values = ctx
            .intervals
            .windows(2)
            .map(|slot| {
                let mean = window_mean(history, self.config.channel, slot[0], slot[1]);
                match mean {
                    Some(mean) if mean > self.config.threshold => 1,
                    _ => 0,
                }
            })
            .collect();
        Ok(values)
    }

    fn calculate_sequence(&mut self, ctx: &DecodeContext) -> Result<String> {
        Ok(values_to_string(ctx.values))
    }
}
