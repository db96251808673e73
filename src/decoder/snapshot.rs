//! Immutable decode result handed to consumers

use crate::error::{MolcommError, Result};
use crate::types::{Landmark, LandmarkInfo, ReceiverHistory, ReceiverInfo, SymbolValue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// One receiver as seen by a consumer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiverSnapshot {
    pub info: ReceiverInfo,
    /// Whether the acquisition thread is still producing
    pub alive: bool,
    pub history: ReceiverHistory,
}

/// Everything decoded up to one cycle
///
/// Built fresh every cycle and shared behind `Arc`, so a consumer holding an
/// old snapshot never sees it change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedSnapshot {
    /// Cycle that produced this snapshot; 0 for the one built at attach
    pub cycle: u64,
    pub captured_at: DateTime<Utc>,
    pub strategy: String,
    pub receivers: Vec<ReceiverSnapshot>,
    pub landmark_info: LandmarkInfo,
    /// One set per landmark name
    pub landmarks: Vec<Vec<Landmark>>,
    pub symbol_intervals: Vec<f64>,
    /// One value per slot between consecutive intervals
    pub symbol_values: Vec<SymbolValue>,
    pub sequence: String,
}

impl DecodedSnapshot {
    /// Number of decoded symbol slots
    pub fn slot_count(&self) -> usize {
        self.symbol_values.len()
    }

    /// Total samples over all receivers
    pub fn total_samples(&self) -> usize {
        self.receivers.iter().map(|r| r.history.len()).sum()
    }

    /// Slots as `(start, end, value)`
    pub fn slots(&self) -> impl Iterator<Item = (f64, f64, SymbolValue)> + '_ {
        self.symbol_intervals
            .windows(2)
            .zip(self.symbol_values.iter())
            .map(|(w, &v)| (w[0], w[1], v))
    }

    /// Write the snapshot as pretty JSON
    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)
            .map_err(|e| MolcommError::Serialization(e.to_string()))?;
        tracing::info!("Exported snapshot of cycle {} to {:?}", self.cycle, path);
        Ok(())
    }
}
