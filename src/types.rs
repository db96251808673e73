//! Core data types for molcomm-rs
//!
//! This module contains the fundamental data structures shared by the
//! receivers, the decode pipeline and the snapshot consumers.
//!
//! # Main Types
//!
//! - [`Sample`] - A single timestamped value vector from one receiver
//! - [`ReceiverHistory`] - Everything a receiver has produced since attach
//! - [`Landmark`] - A structural feature (edge, peak) found in the history
//! - [`ReceiverInfo`] - Capability descriptor of a receiver
//! - [`LandmarkInfo`] - Names and plot symbols of the landmark sets
//! - [`AcquisitionStats`] - Read counters kept by each acquisition thread
//!
//! # Timestamps
//!
//! Timestamps are monotonic seconds as `f64`, measured from the instant the
//! decoder was started. They are non-decreasing within one receiver but carry
//! no ordering guarantee across receivers.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;

/// Classified value of one symbol slot
pub type SymbolValue = i64;

/// Default plot symbol for a landmark set (a circle)
pub const DEFAULT_LANDMARK_SYMBOL: &str = "o";

/// One timestamped vector of channel values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since acquisition started
    pub timestamp: f64,
    /// One value per receiver channel
    pub values: Vec<f64>,
}

impl Sample {
    /// Create a new sample
    pub fn new(timestamp: f64, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }

    /// Number of channels carried by this sample
    pub fn channel_count(&self) -> usize {
        self.values.len()
    }
}

/// Largest chunk that appending will build by merging smaller ones
const MAX_MERGED_CHUNK: usize = 4096;

/// Accumulated samples of one receiver
///
/// Samples live in immutable chunks, one per appended batch. A sample is
/// stored as one unit, so its timestamp never exists without its values.
/// Small trailing chunks are merged into a new chunk, never in place, which
/// keeps the chunk count low while every clone keeps sharing the chunks it
/// saw. Cloning a history copies the chunk list, not the samples.
#[derive(Debug, Clone, Default)]
pub struct ReceiverHistory {
    chunks: Vec<Arc<[Sample]>>,
    len: usize,
}

impl ReceiverHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample
    pub fn push(&mut self, sample: Sample) {
        self.append(vec![sample]);
    }

    /// Append many samples, keeping their order
    pub fn extend(&mut self, samples: impl IntoIterator<Item = Sample>) {
        self.append(samples.into_iter().collect());
    }

    /// Append one drained batch as a new chunk
    pub fn append(&mut self, batch: Vec<Sample>) {
        if batch.is_empty() {
            return;
        }
        self.len += batch.len();
        self.chunks.push(Arc::from(batch));
        self.merge_tail();
    }

    /// Merge the last two chunks while the newer one is at least as large
    fn merge_tail(&mut self) {
        while let [.., previous, last] = self.chunks.as_slice() {
            if last.len() < previous.len() || previous.len() + last.len() > MAX_MERGED_CHUNK {
                break;
            }
            let merged: Vec<Sample> = previous.iter().chain(last.iter()).cloned().collect();
            self.chunks.truncate(self.chunks.len() - 2);
            self.chunks.push(Arc::from(merged));
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no sample has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Storage chunks in arrival order
    pub fn chunks(&self) -> &[Arc<[Sample]>] {
        &self.chunks
    }

    /// All samples in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }

    /// All timestamps in arrival order
    pub fn timestamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.iter().map(|s| s.timestamp)
    }

    /// Timestamp of the newest sample
    pub fn last_timestamp(&self) -> Option<f64> {
        self.chunks
            .last()
            .and_then(|chunk| chunk.last())
            .map(|s| s.timestamp)
    }

    /// Iterate `(timestamp, value)` pairs of one channel
    ///
    /// Samples that do not carry the channel are skipped.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.iter()
            .filter_map(move |s| s.values.get(channel).map(|&value| (s.timestamp, value)))
    }

    /// Values of one channel with timestamps in `[start, end)`
    pub fn channel_window(
        &self,
        channel: usize,
        start: f64,
        end: f64,
    ) -> impl Iterator<Item = (f64, f64)> + '_ {
        // Timestamps are non-decreasing, so the window start can be bisected.
        let first_chunk = self
            .chunks
            .partition_point(|chunk| chunk.last().map_or(true, |s| s.timestamp < start));
        let offset = self
            .chunks
            .get(first_chunk)
            .map_or(0, |chunk| chunk.partition_point(|s| s.timestamp < start));

        self.chunks[first_chunk..]
            .iter()
            .enumerate()
            .flat_map(move |(i, chunk)| {
                let samples: &[Sample] = chunk;
                let skip = if i == 0 { offset } else { 0 };
                samples[skip..].iter()
            })
            .take_while(move |s| s.timestamp < end)
            .filter_map(move |s| s.values.get(channel).map(|&value| (s.timestamp, value)))
    }
}

impl PartialEq for ReceiverHistory {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

/// Serialized as parallel `timestamps` and `values` arrays
impl Serialize for ReceiverHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Timestamps<'a>(&'a ReceiverHistory);
        impl Serialize for Timestamps<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_seq(self.0.timestamps())
            }
        }

        struct Values<'a>(&'a ReceiverHistory);
        impl Serialize for Values<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_seq(self.0.iter().map(|s| &s.values))
            }
        }

        let mut state = serializer.serialize_struct("ReceiverHistory", 2)?;
        state.serialize_field("timestamps", &Timestamps(self))?;
        state.serialize_field("values", &Values(self))?;
        state.end()
    }
}

/// A structural feature in the history, e.g. an edge or a peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Capability descriptor of a receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiverInfo {
    /// Human-readable description (e.g. "Simulated1")
    pub description: String,
    /// One name per channel of the value vector
    pub channel_names: Vec<String>,
}

impl ReceiverInfo {
    /// Number of channels the receiver produces
    pub fn channel_count(&self) -> usize {
        self.channel_names.len()
    }
}

/// Names and plot symbols of the landmark sets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkInfo {
    pub names: Vec<String>,
    /// Always the same length as `names`
    pub symbols: Vec<String>,
}

impl LandmarkInfo {
    /// Number of landmark sets
    pub fn num(&self) -> usize {
        self.names.len()
    }
}

/// Lifecycle state of a decode pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecoderState {
    /// Attached but not acquiring
    #[default]
    Idle,
    /// Acquisition threads are running
    Active,
}

impl std::fmt::Display for DecoderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderState::Idle => write!(f, "Idle"),
            DecoderState::Active => write!(f, "Active"),
        }
    }
}

/// Statistics kept by one acquisition thread
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    /// Number of samples pushed into the buffer
    pub samples: u64,
    /// Number of reads that timed out without data
    pub timeouts: u64,
    /// Number of failed reads
    pub failed_reads: u64,
    /// Failed reads since the last successful one
    pub consecutive_failures: u32,
}

impl AcquisitionStats {
    /// Record a sample pushed into the buffer
    pub fn record_sample(&mut self) {
        self.samples += 1;
        self.consecutive_failures = 0;
    }

    /// Record a read that returned no data before its timeout
    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
    }

    /// Record a failed read
    pub fn record_failure(&mut self) {
        self.failed_reads += 1;
        self.consecutive_failures += 1;
    }

    /// Calculate success rate as percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.samples + self.failed_reads;
        if total == 0 {
            100.0
        } else {
            (self.samples as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_with(points: &[(f64, f64)]) -> ReceiverHistory {
        let mut history = ReceiverHistory::new();
        history.extend(points.iter().map(|&(t, v)| Sample::new(t, vec![v, -v])));
        history
    }

    #[test]
    fn test_history_len_and_last() {
        let history = history_with(&[(0.0, 1.0), (0.1, 2.0), (0.2, 3.0)]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.timestamps().count(), 3);
        assert!(history.iter().all(|s| s.values.len() == 2));
        assert_eq!(history.last_timestamp(), Some(0.2));
        assert!(ReceiverHistory::new().last_timestamp().is_none());
    }

    #[test]
    fn test_small_batches_merge_into_fresh_chunks() {
        let mut history = ReceiverHistory::new();
        for i in 0..8 {
            history.push(Sample::new(i as f64, vec![i as f64]));
        }
        assert_eq!(history.chunks().len(), 1);
        assert_eq!(history.timestamps().collect::<Vec<_>>(), (0..8).map(|i| i as f64).collect::<Vec<_>>());

        // A clone taken before a merge keeps its own chunks untouched
        let before = history.clone();
        history.push(Sample::new(8.0, vec![8.0]));
        assert_eq!(before.len(), 8);
        assert!(Arc::ptr_eq(&before.chunks()[0], &history.chunks()[0]));
        assert_eq!(history.chunks().len(), 2);
    }

    #[test]
    fn test_large_chunks_are_not_merged() {
        let mut history = ReceiverHistory::new();
        let batch = |offset: usize| {
            (0..MAX_MERGED_CHUNK)
                .map(|i| Sample::new((offset + i) as f64, vec![0.0]))
                .collect::<Vec<_>>()
        };
        history.append(batch(0));
        let first = Arc::clone(&history.chunks()[0]);
        history.append(batch(MAX_MERGED_CHUNK));

        assert_eq!(history.chunks().len(), 2);
        assert!(Arc::ptr_eq(&first, &history.chunks()[0]));
        assert_eq!(history.len(), 2 * MAX_MERGED_CHUNK);
    }

    #[test]
    fn test_channel_window_spans_chunks() {
        let mut history = ReceiverHistory::new();
        history.append((0..4).map(|i| Sample::new(i as f64, vec![i as f64])).collect());
        history.append((4..6).map(|i| Sample::new(i as f64, vec![i as f64])).collect());
        history.append(vec![Sample::new(6.0, vec![6.0])]);
        assert_eq!(history.chunks().len(), 3);

        let window: Vec<_> = history.channel_window(0, 2.5, 6.0).collect();
        assert_eq!(window, vec![(3.0, 3.0), (4.0, 4.0), (5.0, 5.0)]);
        assert_eq!(history.channel_window(0, 7.0, 9.0).count(), 0);
    }

    #[test]
    fn test_history_serializes_as_columns() {
        let history = history_with(&[(0.0, 1.0), (0.5, 2.0)]);
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json["timestamps"], serde_json::json!([0.0, 0.5]));
        assert_eq!(json["values"][1], serde_json::json!([2.0, -2.0]));
    }

    #[test]
    fn test_history_equality_ignores_chunking() {
        let one_batch = history_with(&[(0.0, 1.0), (0.5, 2.0)]);
        let mut pushed = ReceiverHistory::new();
        pushed.push(Sample::new(0.0, vec![1.0, -1.0]));
        pushed.push(Sample::new(0.5, vec![2.0, -2.0]));
        assert_eq!(one_batch, pushed);
    }

    #[test]
    fn test_channel_iterator() {
        let history = history_with(&[(0.0, 1.0), (0.1, 2.0)]);
        let second: Vec<_> = history.channel(1).collect();
        assert_eq!(second, vec![(0.0, -1.0), (0.1, -2.0)]);
        assert_eq!(history.channel(5).count(), 0);
    }

    #[test]
    fn test_channel_window_is_half_open() {
        let history = history_with(&[(0.0, 1.0), (0.5, 2.0), (1.0, 3.0), (1.5, 4.0)]);
        let window: Vec<_> = history.channel_window(0, 0.5, 1.5).collect();
        assert_eq!(window, vec![(0.5, 2.0), (1.0, 3.0)]);
    }

    #[test]
    fn test_acquisition_stats() {
        let mut stats = AcquisitionStats::default();
        assert_eq!(stats.success_rate(), 100.0);

        stats.record_failure();
        stats.record_failure();
        assert_eq!(stats.consecutive_failures, 2);

        stats.record_sample();
        stats.record_sample();
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.success_rate(), 50.0);
    }

    #[test]
    fn test_decoder_state_display() {
        assert_eq!(DecoderState::default().to_string(), "Idle");
        assert_eq!(DecoderState::Active.to_string(), "Active");
    }
}
