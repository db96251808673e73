//! Single-producer/single-consumer sample handoff
//!
//! [`sample_channel`] returns the two ends of one receiver's buffer. The
//! [`SampleWriter`] is moved into the acquisition thread and the
//! [`SampleBuffer`] stays with the decode pipeline. Neither end is `Clone`,
//! so the one-writer/one-reader discipline is enforced by ownership.
//!
//! A sample travels as one channel message, so a drain can never observe a
//! timestamp without its values.

use crate::types::Sample;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Create the writer and reader ends of a sample buffer
pub fn sample_channel() -> (SampleWriter, SampleBuffer) {
    let (tx, rx) = unbounded();
    (SampleWriter { tx }, SampleBuffer { rx })
}

/// Producer end, owned by an acquisition thread
#[derive(Debug)]
pub struct SampleWriter {
    tx: Sender<Sample>,
}

impl SampleWriter {
    /// Append a sample; never blocks
    ///
    /// Returns `false` once the reader end has been dropped.
    pub fn push(&self, timestamp: f64, values: Vec<f64>) -> bool {
        self.push_sample(Sample::new(timestamp, values))
    }

    /// Append an already built sample; never blocks
    pub fn push_sample(&self, sample: Sample) -> bool {
        self.tx.send(sample).is_ok()
    }
}

/// Consumer end, owned by the decode pipeline
#[derive(Debug)]
pub struct SampleBuffer {
    rx: Receiver<Sample>,
}

impl SampleBuffer {
    /// Remove and return every sample pending at the time of the call
    ///
    /// Samples pushed while the drain runs are left for the next drain, so a
    /// fast producer cannot keep a drain busy forever.
    pub fn drain_all(&self) -> Vec<Sample> {
        let pending = self.rx.len();
        self.rx.try_iter().take(pending).collect()
    }

    /// Number of samples waiting to be drained
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}
