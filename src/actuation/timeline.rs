//! Timeline construction from a [`PulseSpec`]
//!
//! Every channel contributes an on event and an off event. Events are applied
//! in time order to a running voltage vector that starts at the off voltages
//! at t=0, and all snapshots sharing a time collapse into the last one.

use super::{PulseSpec, VoltageEvent, Voltages, CHANNELS};
use crate::error::Result;

/// Voltages to apply at an offset from the start of the pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineStep {
    pub time_ms: u64,
    pub voltages: Voltages,
}

/// Ordered snapshots with strictly increasing times
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    steps: Vec<TimelineStep>,
}

impl Timeline {
    /// Build the timeline of a pulse
    ///
    /// A zero duration yields an empty timeline.
    pub fn build(spec: &PulseSpec) -> Result<Self> {
        spec.validate()?;
        if spec.duration_ms == 0 {
            return Ok(Self::default());
        }

        let mut events = candidate_events(spec);
        // Stable, so ties keep on-before-off and channel order.
        events.sort_by_key(|e| e.time_offset_ms);

        let mut steps = vec![TimelineStep {
            time_ms: 0,
            voltages: spec.off_voltages,
        }];
        let mut current = spec.off_voltages;

        for event in events {
            current[event.channel] = event.new_voltage;
            let step = TimelineStep {
                time_ms: event.time_offset_ms,
                voltages: current,
            };
            match steps.last_mut() {
                Some(last) if last.time_ms == step.time_ms => *last = step,
                _ => steps.push(step),
            }
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[TimelineStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Offset of the last step, i.e. how long a replay takes
    pub fn total_ms(&self) -> u64 {
        self.steps.last().map_or(0, |s| s.time_ms)
    }

    /// Waits between consecutive steps
    pub fn deltas_ms(&self) -> impl Iterator<Item = u64> + '_ {
        self.steps.windows(2).map(|w| w[1].time_ms - w[0].time_ms)
    }
}

/// On events of all channels followed by their off events
fn candidate_events(spec: &PulseSpec) -> Vec<VoltageEvent> {
    let on = (0..CHANNELS).map(|c| VoltageEvent {
        time_offset_ms: spec.delays_ms[c],
        channel: c,
        new_voltage: spec.on_voltages[c],
    });
    let off = (0..CHANNELS).map(|c| VoltageEvent {
        time_offset_ms: spec.delays_ms[c].saturating_add(spec.duration_ms),
        channel: c,
        new_voltage: spec.off_voltages[c],
    });
    on.chain(off).collect()
}
