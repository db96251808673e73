//! Real-time replay of a [`Timeline`]
//!
//! The first snapshot is issued immediately, then the scheduler sleeps each
//! delta and issues the next one. The stop flag is checked before every sleep
//! and again before every issue; once raised, nothing more is sent.

use super::{Timeline, Voltages};
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of delays, injectable for tests
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How a replay ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Every step was issued
    Completed { issued: usize },
    /// The stop flag was raised after `issued` steps
    Cancelled { issued: usize },
}

impl ReplayOutcome {
    pub fn issued(&self) -> usize {
        match self {
            ReplayOutcome::Completed { issued } | ReplayOutcome::Cancelled { issued } => *issued,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReplayOutcome::Cancelled { .. })
    }
}

/// Replays timelines with an injected sleeper
#[derive(Clone)]
pub struct ActuationScheduler {
    sleeper: Arc<dyn Sleeper>,
}

impl Default for ActuationScheduler {
    fn default() -> Self {
        Self::new(Arc::new(ThreadSleeper))
    }
}

impl ActuationScheduler {
    pub fn new(sleeper: Arc<dyn Sleeper>) -> Self {
        Self { sleeper }
    }

    /// The sleeper used for every wait
    pub fn sleeper(&self) -> &Arc<dyn Sleeper> {
        &self.sleeper
    }

    /// Sleep for `ms` milliseconds
    pub fn pause_ms(&self, ms: u64) {
        if ms > 0 {
            self.sleeper.sleep(Duration::from_millis(ms));
        }
    }

    /// Replay `timeline`, calling `issue` for every snapshot
    ///
    /// An `issue` error aborts the replay and is returned.
    pub fn replay<F>(&self, timeline: &Timeline, stopped: &AtomicBool, mut issue: F) -> Result<ReplayOutcome>
    where
        F: FnMut(&Voltages) -> Result<()>,
    {
        let mut issued = 0;
        let mut previous_ms = None;

        for step in timeline.steps() {
            if let Some(previous) = previous_ms {
                if stopped.load(Ordering::SeqCst) {
                    return Ok(ReplayOutcome::Cancelled { issued });
                }
                self.pause_ms(step.time_ms - previous);
            }
            if stopped.load(Ordering::SeqCst) {
                return Ok(ReplayOutcome::Cancelled { issued });
            }

            issue(&step.voltages)?;
            issued += 1;
            previous_ms = Some(step.time_ms);
        }

        Ok(ReplayOutcome::Completed { issued })
    }
}
