//! Built-in decode strategies
//!
//! - [`Passthrough`] - raw display, no symbolic decoding
//! - [`OnOffKeying`] - binary threshold decoding
//! - [`AmplitudeLevels`] - multi-level amplitude decoding
//!
//! The keyed strategies share one timing model: the first sample crossing a
//! threshold anchors the slot grid, slots have a fixed duration, and a slot
//! is only decoded once a later sample proves it complete. Boundaries are
//! recomputed from the anchor on every cycle, so earlier boundaries come out
//! bit-identical and the interval list only ever grows.

pub mod amplitude_levels;
pub mod on_off_keying;
pub mod passthrough;

pub use amplitude_levels::{AmplitudeLevels, AmplitudeLevelsConfig};
pub use on_off_keying::{OnOffKeying, OnOffKeyingConfig};
pub use passthrough::Passthrough;

use crate::error::{MolcommError, Result};
use crate::types::{ReceiverHistory, ReceiverInfo, SymbolValue};

/// Check that the first receiver carries `channel`
pub(crate) fn validate_channel(strategy: &str, receivers: &[ReceiverInfo], channel: usize) -> Result<()> {
    let Some(first) = receivers.first() else {
        return Err(invalid(strategy, "needs at least one receiver".to_string()));
    };
    if channel >= first.channel_count() {
        return Err(invalid(
            strategy,
            format!(
                "channel {} not available on '{}' ({} channels)",
                channel,
                first.description,
                first.channel_count()
            ),
        ));
    }
    Ok(())
}

pub(crate) fn validate_symbol_duration(strategy: &str, seconds: f64) -> Result<()> {
    if seconds.is_finite() && seconds > 0.0 {
        Ok(())
    } else {
        Err(invalid(
            strategy,
            format!("symbol duration must be positive, got {}", seconds),
        ))
    }
}

pub(crate) fn invalid(strategy: &str, message: String) -> MolcommError {
    MolcommError::Strategy {
        strategy: strategy.to_string(),
        step: "validate",
        message,
    }
}

/// Timestamp of the first sample at or above `threshold`
pub(crate) fn first_at_or_above(history: &ReceiverHistory, channel: usize, threshold: f64) -> Option<f64> {
    history
        .channel(channel)
        .find(|&(_, value)| value >= threshold)
        .map(|(t, _)| t)
}

/// Slot boundaries `anchor + k * duration` up to the newest timestamp
///
/// A boundary is only emitted once the history has reached it, so every
/// slot between two boundaries is complete.
pub(crate) fn fixed_slot_boundaries(anchor: f64, duration: f64, newest: f64) -> Vec<f64> {
    let mut boundaries = Vec::new();
    let mut k = 0u64;
    loop {
        let boundary = anchor + k as f64 * duration;
        if boundary > newest {
            break;
        }
        boundaries.push(boundary);
        k += 1;
    }
    boundaries
}

/// Mean of one channel inside `[start, end)`; `None` for an empty window
pub(crate) fn window_mean(history: &ReceiverHistory, channel: usize, start: f64, end: f64) -> Option<f64> {
    let (sum, count) = history
        .channel_window(channel, start, end)
        .fold((0.0, 0usize), |(sum, count), (_, v)| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Render symbol values as digits (base 36 for large alphabets)
pub(crate) fn values_to_string(values: &[SymbolValue]) -> String {
    values
        .iter()
        .map(|&v| {
            u32::try_from(v)
                .ok()
                .and_then(|d| char::from_digit(d, 36))
                .unwrap_or('?')
        })
        .collect()
}
