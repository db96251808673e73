//! Diagnostics published by the decode pipeline
//!
//! Contract violations by a strategy and recoverable metadata problems are
//! repaired by the pipeline. Each repair is logged and sent on a bounded
//! channel; when nobody drains the channel, new diagnostics are dropped.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::fmt;

/// Capacity of the diagnostic channel
pub const DIAGNOSTIC_CAPACITY: usize = 256;

/// A repaired problem
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeDiagnostic {
    /// Proposed intervals did not keep the accepted ones as a prefix
    IntervalsRewritten {
        cycle: u64,
        accepted: usize,
        proposed: usize,
    },
    /// A boundary did not increase; the tail from `index` was dropped
    NonMonotonicIntervals { cycle: u64, index: usize },
    /// More values than slots; the surplus was dropped
    SymbolValuesTruncated {
        cycle: u64,
        slots: usize,
        values: usize,
    },
    /// Fewer values than slots; exposed intervals were shortened
    SymbolValuesMissing {
        cycle: u64,
        slots: usize,
        values: usize,
    },
    /// The proposed sequence did not extend the exposed one
    SequenceRetracted { cycle: u64 },
    /// Landmark set count differed from the configured names
    LandmarkCountMismatch {
        cycle: u64,
        expected: usize,
        got: usize,
    },
    /// Landmark symbols did not match the landmark names
    LandmarkSymbolsMismatch { names: usize, symbols: usize },
    /// Receiver descriptions did not match the receivers
    ReceiverDescriptionsMismatch { receivers: usize, descriptions: usize },
    /// A receiver stopped after too many failed reads
    ReceiverDead { receiver: usize, description: String },
}

impl fmt::Display for DecodeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeDiagnostic::IntervalsRewritten { cycle, accepted, proposed } => write!(
                f,
                "cycle {}: strategy rewrote accepted symbol intervals ({} accepted, {} proposed), keeping accepted",
                cycle, accepted, proposed
            ),
            DecodeDiagnostic::NonMonotonicIntervals { cycle, index } => write!(
                f,
                "cycle {}: symbol interval {} does not increase, dropping it and what follows",
                cycle, index
            ),
            DecodeDiagnostic::SymbolValuesTruncated { cycle, slots, values } => write!(
                f,
                "cycle {}: {} symbol values for {} slots, dropping the surplus",
                cycle, values, slots
            ),
            DecodeDiagnostic::SymbolValuesMissing { cycle, slots, values } => write!(
                f,
                "cycle {}: {} symbol values for {} slots, shortening exposed intervals",
                cycle, values, slots
            ),
            DecodeDiagnostic::SequenceRetracted { cycle } => write!(
                f,
                "cycle {}: sequence does not extend the previous one, keeping previous",
                cycle
            ),
            DecodeDiagnostic::LandmarkCountMismatch { cycle, expected, got } => write!(
                f,
                "cycle {}: {} landmark sets for {} landmark names",
                cycle, got, expected
            ),
            DecodeDiagnostic::LandmarkSymbolsMismatch { names, symbols } => write!(
                f,
                "{} landmark symbols for {} landmark names, using 'o' for all",
                symbols, names
            ),
            DecodeDiagnostic::ReceiverDescriptionsMismatch { receivers, descriptions } => write!(
                f,
                "{} receiver descriptions for {} receivers, using generated descriptions",
                descriptions, receivers
            ),
            DecodeDiagnostic::ReceiverDead { receiver, description } => {
                write!(f, "receiver {} ('{}') stopped producing samples", receiver, description)
            }
        }
    }
}

/// Sending side held by the pipeline
#[derive(Debug, Clone)]
pub struct DiagnosticSink {
    tx: Sender<DecodeDiagnostic>,
    rx: Receiver<DecodeDiagnostic>,
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        let (tx, rx) = bounded(DIAGNOSTIC_CAPACITY);
        Self { tx, rx }
    }
}

impl DiagnosticSink {
    /// Log and publish a diagnostic
    pub fn report(&self, diagnostic: DecodeDiagnostic) {
        tracing::warn!("{}", diagnostic);
        match self.tx.try_send(diagnostic) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Diagnostic channel full, dropping diagnostic");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// A receiver for consumers; all clones share one queue
    pub fn subscribe(&self) -> Receiver<DecodeDiagnostic> {
        self.rx.clone()
    }

    /// Take every pending diagnostic
    pub fn drain(&self) -> Vec<DecodeDiagnostic> {
        self.rx.try_iter().collect()
    }
}
