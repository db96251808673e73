//! Amplitude level decoding
//!
//! Each slot's mean is quantized to one of `levels` levels spaced
//! `level_step` apart. The grid is anchored on the first sample reaching
//! `sync_threshold`, so the message must start with a non-zero symbol.

use super::{
    first_at_or_above, fixed_slot_boundaries, invalid, validate_channel,
    validate_symbol_duration, values_to_string, window_mean,
};
use crate::decoder::strategy::{DecodeContext, DecoderStrategy};
use crate::error::Result;
use crate::types::{Landmark, ReceiverInfo, SymbolValue};
use serde::{Deserialize, Serialize};

const NAME: &str = "amplitude_levels";

/// Parameters of the amplitude level decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeLevelsConfig {
    /// Channel of the first receiver to decode
    #[serde(default)]
    pub channel: usize,
    /// Alphabet size, 2 to 36
    pub levels: u32,
    /// Signal difference between adjacent levels
    pub level_step: f64,
    /// Length of one symbol slot in seconds
    pub symbol_duration_s: f64,
    /// Level whose first crossing starts the slot grid
    pub sync_threshold: f64,
}

impl Default for AmplitudeLevelsConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            levels: 4,
            level_step: 1.0,
            symbol_duration_s: 1.0,
            sync_threshold: 0.5,
        }
    }
}

/// Multi-level amplitude decoder
#[derive(Debug, Clone)]
pub struct AmplitudeLevels {
    config: AmplitudeLevelsConfig,
}

impl AmplitudeLevels {
    pub fn new(config: AmplitudeLevelsConfig) -> Self {
        Self { config }
    }

    /// Level of a slot mean
    pub fn quantize(&self, mean: f64) -> SymbolValue {
        let top = self.config.levels.saturating_sub(1) as f64;
        (mean / self.config.level_step).round().clamp(0.0, top) as SymbolValue
    }

    fn intervals(&self, ctx: &DecodeContext) -> Vec<f64> {
        let Some(history) = ctx.receiver(0) else {
            return Vec::new();
        };
        match (
            first_at_or_above(history, self.config.channel, self.config.sync_threshold),
            history.last_timestamp(),
        ) {
            (Some(anchor), Some(newest)) => {
                fixed_slot_boundaries(anchor, self.config.symbol_duration_s, newest)
            }
            _ => Vec::new(),
        }
    }
}

impl DecoderStrategy for AmplitudeLevels {
    fn name(&self) -> &str {
        NAME
    }

    fn default_landmark_names(&self) -> Vec<String> {
        vec!["Slot peaks".to_string()]
    }

    fn validate(&self, receivers: &[ReceiverInfo]) -> Result<()> {
        validate_channel(NAME, receivers, self.config.channel)?;
        validate_symbol_duration(NAME, self.config.symbol_duration_s)?;
        if !(2..=36).contains(&self.config.levels) {
            return Err(invalid(
                NAME,
                format!("levels must be between 2 and 36, got {}", self.config.levels),
            ));
        }
        if !(self.config.level_step.is_finite() && self.config.level_step > 0.0) {
            return Err(invalid(NAME, "level step must be positive".to_string()));
        }
        Ok(())
    }

    /// Highest sample of every complete slot
    fn calculate_landmarks(&mut self, ctx: &DecodeContext) -> Result<Vec<Vec<Landmark>>> {
        let Some(history) = ctx.receiver(0) else {
            return Ok(Vec::new());
        };
        let peaks = self
            .intervals(ctx)
            .windows(2)
            .filter_map(|slot| {
                history
                    .channel_window(self.config.channel, slot[0], slot[1])
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(t, v)| Landmark::new(t, v))
            })
            .collect();
        Ok(vec![peaks])
    }

    fn calculate_symbol_intervals(&mut self, ctx: &DecodeContext) -> Result<Vec<f64>> {
        Ok(self.intervals(ctx))
    }

    fn calculate_symbol_values(&mut self, ctx: &DecodeContext) -> Result<Vec<SymbolValue>> {
        let Some(history) = ctx.receiver(0) else {
            return Ok(Vec::new());
        };
        let values = ctx
            .intervals
            .windows(2)
            .map(|slot| {
                window_mean(history, self.config.channel, slot[0], slot[1])
                    .map_or(0, |mean| self.quantize(mean))
            })
            .collect();
        Ok(values)
    }

    fn calculate_sequence(&mut self, ctx: &DecodeContext) -> Result<String> {
        Ok(values_to_string(ctx.values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReceiverHistory, Sample};

    fn decoder() -> AmplitudeLevels {
        AmplitudeLevels::new(AmplitudeLevelsConfig::default())
    }

    #[test]
    fn test_quantize_clamps() {
        let d = decoder();
        assert_eq!(d.quantize(-1.0), 0);
        assert_eq!(d.quantize(0.4), 0);
        assert_eq!(d.quantize(1.6), 2);
        assert_eq!(d.quantize(9.0), 3);
    }

    #[test]
    fn test_decodes_levels() {
        // Levels 2, 0, 3, 1 in 1 s slots at 20 Hz, followed by silence
        let symbols = [2.0, 0.0, 3.0, 1.0];
        let mut history = ReceiverHistory::new();
        for n in 0..=100 {
            let t = n as f64 / 20.0;
            let value = symbols.get(t.floor() as usize).copied().unwrap_or(0.0);
            history.push(Sample::new(t, vec![value]));
        }
        let histories = vec![history];
        let infos = vec![ReceiverInfo {
            description: "Simulated1".to_string(),
            channel_names: vec!["c".to_string()],
        }];

        let mut d = decoder();
        let mut ctx = DecodeContext::new(&histories, &infos);
        let intervals = d.calculate_symbol_intervals(&ctx).unwrap();
        ctx.intervals = &intervals;
        let values = d.calculate_symbol_values(&ctx).unwrap();
        ctx.values = &values;

        assert_eq!(intervals[0], 0.0);
        assert_eq!(&values[..4], &[2, 0, 3, 1]);
        assert!(d.calculate_sequence(&ctx).unwrap().starts_with("2031"));

        let peaks = d.calculate_landmarks(&ctx).unwrap();
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].len(), values.len());
    }

    #[test]
    fn test_validate_levels() {
        let infos = vec![ReceiverInfo {
            description: "Simulated1".to_string(),
            channel_names: vec!["c".to_string()],
        }];
        assert!(decoder().validate(&infos).is_ok());

        let d = AmplitudeLevels::new(AmplitudeLevelsConfig {
            levels: 1,
            ..AmplitudeLevelsConfig::default()
        });
        assert!(d.validate(&infos).is_err());

        let d = AmplitudeLevels::new(AmplitudeLevelsConfig {
            level_step: 0.0,
            ..AmplitudeLevelsConfig::default()
        });
        assert!(d.validate(&infos).is_err());
    }
}
