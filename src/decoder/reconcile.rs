//! Repair of strategy results before they are exposed
//!
//! The exposed decode obeys three rules no matter what a strategy returns:
//! intervals only grow and strictly increase, there is exactly one value per
//! exposed slot, and the sequence only grows.

use super::diagnostics::DecodeDiagnostic;
use crate::types::{Landmark, SymbolValue};

/// Raw results of one cycle; intervals go through `accept_intervals` first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Proposal {
    pub landmarks: Vec<Vec<Landmark>>,
    pub values: Vec<SymbolValue>,
    pub sequence: String,
}

/// What consumers see
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exposed {
    pub landmarks: Vec<Vec<Landmark>>,
    pub intervals: Vec<f64>,
    pub values: Vec<SymbolValue>,
    pub sequence: String,
}

/// Cross-cycle state of the repair rules
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    /// Intervals accepted so far, possibly ahead of the exposed ones
    accepted: Vec<f64>,
    exposed: Exposed,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intervals accepted so far
    pub fn accepted_intervals(&self) -> &[f64] {
        &self.accepted
    }

    /// Last exposed decode
    pub fn exposed(&self) -> &Exposed {
        &self.exposed
    }

    /// Check proposed intervals against the accepted ones
    ///
    /// Returns the intervals the value step should see.
    pub fn accept_intervals(
        &mut self,
        cycle: u64,
        proposed: Vec<f64>,
        diagnostics: &mut Vec<DecodeDiagnostic>,
    ) -> &[f64] {
        if !proposed.starts_with(&self.accepted) {
            diagnostics.push(DecodeDiagnostic::IntervalsRewritten {
                cycle,
                accepted: self.accepted.len(),
                proposed: proposed.len(),
            });
            return &self.accepted;
        }

        let mut proposed = proposed;
        // The accepted prefix is already known to be valid.
        let bad = (self.accepted.len()..proposed.len()).find(|&i| {
            let t = proposed[i];
            !t.is_finite() || (i > 0 && !(t > proposed[i - 1]))
        });
        if let Some(index) = bad {
            diagnostics.push(DecodeDiagnostic::NonMonotonicIntervals { cycle, index });
            proposed.truncate(index);
        }

        self.accepted = proposed;
        &self.accepted
    }

    /// Apply the value, sequence and landmark rules and expose the result
    pub fn expose(
        &mut self,
        cycle: u64,
        landmark_sets: usize,
        proposal: Proposal,
        diagnostics: &mut Vec<DecodeDiagnostic>,
    ) -> &Exposed {
        let slots = self.accepted.len().saturating_sub(1);
        let mut values = proposal.values;

        if values.len() > slots {
            diagnostics.push(DecodeDiagnostic::SymbolValuesTruncated {
                cycle,
                slots,
                values: values.len(),
            });
            values.truncate(slots);
        } else if values.len() < slots {
            diagnostics.push(DecodeDiagnostic::SymbolValuesMissing {
                cycle,
                slots,
                values: values.len(),
            });
            // Slots exposed before keep their value, so exposed intervals never shrink.
            let previous = &self.exposed.values;
            if values.len() < previous.len() {
                values.extend_from_slice(&previous[values.len()..]);
            }
        }

        let exposed_boundaries = if self.accepted.is_empty() {
            0
        } else {
            values.len() + 1
        };
        let intervals = self.accepted[..exposed_boundaries].to_vec();

        let sequence = if proposal.sequence.starts_with(&self.exposed.sequence) {
            proposal.sequence
        } else {
            diagnostics.push(DecodeDiagnostic::SequenceRetracted { cycle });
            self.exposed.sequence.clone()
        };

        let mut landmarks = proposal.landmarks;
        if landmarks.is_empty() {
            landmarks.resize(landmark_sets, Vec::new());
        } else if landmarks.len() != landmark_sets {
            diagnostics.push(DecodeDiagnostic::LandmarkCountMismatch {
                cycle,
                expected: landmark_sets,
                got: landmarks.len(),
            });
            landmarks.resize(landmark_sets, Vec::new());
        }

        self.exposed = Exposed {
            landmarks,
            intervals,
            values,
            sequence,
        };
        &self.exposed
    }
}
