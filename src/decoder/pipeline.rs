//! Decode pipeline
//!
//! Owns the receivers of one decoder, their acquisition threads and the
//! strategy. Decoding is pulled: every [`DecodePipeline::decode`] call runs
//! one cycle
//!
//! drain buffers → append history → landmarks → intervals → values →
//! sequence → reconcile → snapshot
//!
//! and publishes a new immutable [`DecodedSnapshot`]. A failing strategy step
//! aborts its cycle and leaves the previous snapshot in place.

use super::diagnostics::{DecodeDiagnostic, DiagnosticSink};
use super::metadata::{resolve_landmark_info, resolve_receiver_descriptions};
use super::reconcile::{Proposal, Reconciler};
use super::snapshot::{DecodedSnapshot, ReceiverSnapshot};
use super::strategy::{AnyDecoder, BuiltinDecoder, DecodeContext};
use crate::config::{DecoderConfig, DEFAULT_MAX_CONSECUTIVE_ERRORS, DEFAULT_READ_TIMEOUT_MS};
use crate::error::{MolcommError, Result};
use crate::receiver::{
    build_receiver, sample_channel, AcquisitionHandle, AcquisitionTask, Receiver, SampleBuffer,
};
use crate::types::{AcquisitionStats, DecoderState, LandmarkInfo, ReceiverHistory, ReceiverInfo};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Metadata and acquisition settings of an attach
#[derive(Debug, Clone)]
pub struct AttachOptions {
    pub receiver_descriptions: Option<Vec<String>>,
    pub landmark_names: Option<Vec<String>>,
    pub landmark_symbols: Option<Vec<String>>,
    pub read_timeout: Duration,
    pub max_consecutive_errors: u32,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            receiver_descriptions: None,
            landmark_names: None,
            landmark_symbols: None,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

impl From<&DecoderConfig> for AttachOptions {
    fn from(config: &DecoderConfig) -> Self {
        Self {
            receiver_descriptions: config.receiver_descriptions.clone(),
            landmark_names: config.landmark_names.clone(),
            landmark_symbols: config.landmark_symbols.clone(),
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            max_consecutive_errors: config.max_consecutive_errors,
        }
    }
}

/// Acquisition side of one receiver
struct ReceiverSlot {
    /// Present while idle; owned by the acquisition thread while active
    receiver: Option<Box<dyn Receiver>>,
    buffer: SampleBuffer,
    handle: Option<AcquisitionHandle>,
    alive: Arc<AtomicBool>,
    reported_dead: bool,
    stats: AcquisitionStats,
}

/// Receivers, strategy and decode state of one decoder
pub struct DecodePipeline {
    strategy: AnyDecoder,
    slots: Vec<ReceiverSlot>,
    infos: Vec<ReceiverInfo>,
    histories: Vec<ReceiverHistory>,
    landmark_info: LandmarkInfo,
    read_timeout: Duration,
    max_consecutive_errors: u32,
    state: DecoderState,
    stop: Arc<AtomicBool>,
    /// Fixed at the first start so timestamps keep growing across restarts
    epoch: Option<Instant>,
    reconciler: Reconciler,
    cycle: u64,
    latest: Arc<DecodedSnapshot>,
    diagnostics: DiagnosticSink,
}

impl DecodePipeline {
    /// Build receivers and the built-in strategy from config
    pub fn attach(config: &DecoderConfig) -> Result<Self> {
        let receivers = config
            .receivers
            .iter()
            .map(build_receiver)
            .collect::<Result<Vec<_>>>()?;
        let strategy = AnyDecoder::from(BuiltinDecoder::from_kind(&config.kind));
        Self::attach_with(strategy, receivers, AttachOptions::from(config))
    }

    /// Attach an explicit strategy to already built receivers
    ///
    /// The strategy is validated and dry-run once on empty history; either
    /// failing is fatal for the attach.
    pub fn attach_with(
        strategy: AnyDecoder,
        receivers: Vec<Box<dyn Receiver>>,
        options: AttachOptions,
    ) -> Result<Self> {
        if receivers.is_empty() {
            return Err(MolcommError::Config(
                "A decoder needs at least one receiver".to_string(),
            ));
        }

        let diagnostics = DiagnosticSink::default();
        let type_names: Vec<&str> = receivers.iter().map(|r| r.kind()).collect();
        let (descriptions, mismatch) =
            resolve_receiver_descriptions(&type_names, options.receiver_descriptions.as_deref());
        if let Some(diagnostic) = mismatch {
            diagnostics.report(diagnostic);
        }

        let infos: Vec<ReceiverInfo> = descriptions
            .into_iter()
            .zip(receivers.iter())
            .map(|(description, receiver)| ReceiverInfo {
                description,
                channel_names: receiver.channel_names(),
            })
            .collect();

        let name = strategy.name().to_string();
        strategy
            .validate(&infos)
            .map_err(|e| step_error(&name, "validate", e))?;

        let landmark_names = options
            .landmark_names
            .clone()
            .unwrap_or_else(|| strategy.default_landmark_names());
        let (landmark_info, mismatch) =
            resolve_landmark_info(landmark_names, options.landmark_symbols.as_deref());
        if let Some(diagnostic) = mismatch {
            diagnostics.report(diagnostic);
        }

        let slots = receivers
            .into_iter()
            .map(|receiver| {
                let (_, buffer) = sample_channel();
                ReceiverSlot {
                    receiver: Some(receiver),
                    buffer,
                    handle: None,
                    alive: Arc::new(AtomicBool::new(true)),
                    reported_dead: false,
                    stats: AcquisitionStats::default(),
                }
            })
            .collect::<Vec<_>>();
        let histories = vec![ReceiverHistory::new(); slots.len()];

        let latest = Arc::new(DecodedSnapshot {
            cycle: 0,
            captured_at: Utc::now(),
            strategy: name.clone(),
            receivers: Vec::new(),
            landmark_info: landmark_info.clone(),
            landmarks: vec![Vec::new(); landmark_info.num()],
            symbol_intervals: Vec::new(),
            symbol_values: Vec::new(),
            sequence: String::new(),
        });

        let mut pipeline = Self {
            strategy,
            slots,
            infos,
            histories,
            landmark_info,
            read_timeout: options.read_timeout,
            max_consecutive_errors: options.max_consecutive_errors,
            state: DecoderState::Idle,
            stop: Arc::new(AtomicBool::new(false)),
            epoch: None,
            reconciler: Reconciler::new(),
            cycle: 0,
            latest,
            diagnostics,
        };

        pipeline.run_cycle(0).map_err(|e| {
            tracing::error!("Dry run of decoder '{}' failed: {}", name, e);
            e
        })?;

        tracing::info!(
            "Attached decoder '{}' with {} receiver(s): {}",
            name,
            pipeline.infos.len(),
            pipeline
                .infos
                .iter()
                .map(|i| i.description.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(pipeline)
    }

    // ==================== Lifecycle ====================

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Spawn one acquisition thread per receiver
    pub fn start(&mut self) -> Result<()> {
        if self.state == DecoderState::Active {
            return Err(MolcommError::InvalidState(
                "Decoder is already active".to_string(),
            ));
        }

        let epoch = *self.epoch.get_or_insert_with(Instant::now);
        let stop = Arc::new(AtomicBool::new(false));
        self.stop = stop.clone();

        let mut spawn_error = None;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(receiver) = slot.receiver.take() else {
                tracing::warn!("Receiver {} is gone, not restarting it", index);
                continue;
            };

            // Samples left from the previous run stay in order before new ones
            self.histories[index].append(slot.buffer.drain_all());
            let (writer, buffer) = sample_channel();
            slot.buffer = buffer;
            slot.alive.store(true, Ordering::SeqCst);
            slot.reported_dead = false;

            let task = AcquisitionTask::new(
                index,
                receiver,
                writer,
                epoch,
                stop.clone(),
                slot.alive.clone(),
                self.read_timeout,
                self.max_consecutive_errors,
            );
            match task.spawn() {
                Ok(handle) => slot.handle = Some(handle),
                Err(failure) => {
                    // Keep the receiver so a later start can retry it
                    slot.receiver = Some(failure.receiver);
                    slot.alive.store(false, Ordering::SeqCst);
                    spawn_error = Some(failure.error);
                    break;
                }
            }
        }

        self.state = DecoderState::Active;
        if let Some(e) = spawn_error {
            tracing::error!("Failed to start acquisition: {}", e);
            // Join whatever did start; the spawn error is the one to report
            let _ = self.stop();
            return Err(e);
        }

        tracing::info!("Decoder '{}' started", self.strategy.name());
        Ok(())
    }

    /// Stop and join every acquisition thread
    ///
    /// Receivers are handed back, so the decoder can be started again.
    pub fn stop(&mut self) -> Result<()> {
        if self.state == DecoderState::Idle {
            return Err(MolcommError::InvalidState("Decoder is not active".to_string()));
        }

        self.stop.store(true, Ordering::SeqCst);
        let mut first_error = None;
        for slot in &mut self.slots {
            let Some(handle) = slot.handle.take() else {
                continue;
            };
            match handle.join() {
                Ok((receiver, stats)) => {
                    slot.receiver = Some(receiver);
                    slot.stats = stats;
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    slot.alive.store(false, Ordering::SeqCst);
                    first_error.get_or_insert(e);
                }
            }
        }

        self.state = DecoderState::Idle;
        tracing::info!("Decoder '{}' stopped", self.strategy.name());
        first_error.map_or(Ok(()), Err)
    }

    // ==================== Decoding ====================

    /// Run one decode cycle
    ///
    /// On a strategy error the previous snapshot stays current and the error
    /// is returned. Samples drained in a failed cycle are kept in history.
    pub fn decode(&mut self) -> Result<Arc<DecodedSnapshot>> {
        self.drain_buffers();
        self.cycle += 1;
        let cycle = self.cycle;

        match self.run_cycle(cycle) {
            Ok(snapshot) => {
                tracing::debug!(
                    "Decode cycle {}: {} samples, {} slots, sequence '{}'",
                    cycle,
                    snapshot.total_samples(),
                    snapshot.slot_count(),
                    snapshot.sequence
                );
                Ok(snapshot)
            }
            Err(e) => {
                tracing::error!("Decode cycle {} failed: {}", cycle, e);
                Err(e)
            }
        }
    }

    /// The current snapshot
    pub fn get_decoded(&self) -> Arc<DecodedSnapshot> {
        Arc::clone(&self.latest)
    }

    fn drain_buffers(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            self.histories[index].append(slot.buffer.drain_all());

            if !slot.reported_dead && !slot.alive.load(Ordering::SeqCst) {
                slot.reported_dead = true;
                self.diagnostics.report(DecodeDiagnostic::ReceiverDead {
                    receiver: index,
                    description: self.infos[index].description.clone(),
                });
            }
        }
    }

    /// Run the strategy steps and publish a snapshot
    ///
    /// Works on a copy of the reconciliation state, so a failed step leaves
    /// nothing half-applied.
    fn run_cycle(&mut self, cycle: u64) -> Result<Arc<DecodedSnapshot>> {
        let name = self.strategy.name().to_string();
        let mut reconciler = self.reconciler.clone();
        let mut diagnostics = Vec::new();
        let previous = self.reconciler.exposed();
        let previous_intervals = self.reconciler.accepted_intervals();

        let mut ctx = DecodeContext {
            receivers: &self.histories,
            receiver_info: &self.infos,
            landmark_names: &self.landmark_info.names,
            landmarks: &[],
            intervals: &[],
            values: &[],
            previous_intervals,
            previous_values: &previous.values,
            previous_sequence: &previous.sequence,
            cycle,
        };

        let landmarks = self
            .strategy
            .calculate_landmarks(&ctx)
            .map_err(|e| step_error(&name, "calculate_landmarks", e))?;
        ctx.landmarks = &landmarks;

        let proposed = self
            .strategy
            .calculate_symbol_intervals(&ctx)
            .map_err(|e| step_error(&name, "calculate_symbol_intervals", e))?;
        let intervals = reconciler
            .accept_intervals(cycle, proposed, &mut diagnostics)
            .to_vec();
        ctx.intervals = &intervals;

        let values = self
            .strategy
            .calculate_symbol_values(&ctx)
            .map_err(|e| step_error(&name, "calculate_symbol_values", e))?;
        ctx.values = &values;

        let sequence = self
            .strategy
            .calculate_sequence(&ctx)
            .map_err(|e| step_error(&name, "calculate_sequence", e))?;

        let exposed = reconciler
            .expose(
                cycle,
                self.landmark_info.num(),
                Proposal {
                    landmarks,
                    values,
                    sequence,
                },
                &mut diagnostics,
            )
            .clone();

        for diagnostic in diagnostics {
            self.diagnostics.report(diagnostic);
        }

        let snapshot = Arc::new(DecodedSnapshot {
            cycle,
            captured_at: Utc::now(),
            strategy: name,
            receivers: self.receiver_snapshots(),
            landmark_info: self.landmark_info.clone(),
            landmarks: exposed.landmarks,
            symbol_intervals: exposed.intervals,
            symbol_values: exposed.values,
            sequence: exposed.sequence,
        });

        self.reconciler = reconciler;
        self.latest = Arc::clone(&snapshot);
        Ok(snapshot)
    }

    /// Per-receiver view for a snapshot; shares the drained history chunks
    fn receiver_snapshots(&self) -> Vec<ReceiverSnapshot> {
        self.infos
            .iter()
            .zip(&self.slots)
            .zip(&self.histories)
            .map(|((info, slot), history)| ReceiverSnapshot {
                info: info.clone(),
                alive: slot.alive.load(Ordering::SeqCst),
                history: history.clone(),
            })
            .collect()
    }

    // ==================== Metadata ====================

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Number of decode cycles run so far
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn get_receiver_info(&self) -> &[ReceiverInfo] {
        &self.infos
    }

    pub fn get_landmark_info(&self) -> &LandmarkInfo {
        &self.landmark_info
    }

    /// Whether receiver `index` is still producing
    pub fn receiver_alive(&self, index: usize) -> Option<bool> {
        self.slots
            .get(index)
            .map(|slot| slot.alive.load(Ordering::SeqCst))
    }

    /// Acquisition statistics per receiver as of the last stop
    pub fn acquisition_stats(&self) -> Vec<AcquisitionStats> {
        self.slots.iter().map(|slot| slot.stats.clone()).collect()
    }

    /// Channel of repaired problems; clones share one queue
    pub fn diagnostics(&self) -> crossbeam_channel::Receiver<DecodeDiagnostic> {
        self.diagnostics.subscribe()
    }

    /// Take every pending diagnostic
    pub fn drain_diagnostics(&self) -> Vec<DecodeDiagnostic> {
        self.diagnostics.drain()
    }
}

impl Drop for DecodePipeline {
    fn drop(&mut self) {
        if self.state == DecoderState::Active {
            if let Err(e) = self.stop() {
                tracing::warn!("Error stopping decoder on drop: {}", e);
            }
        }
    }
}

/// Attribute an error to a strategy step
fn step_error(strategy: &str, step: &'static str, error: MolcommError) -> MolcommError {
    match error {
        e @ MolcommError::Strategy { .. } => e,
        other => MolcommError::Strategy {
            strategy: strategy.to_string(),
            step,
            message: other.to_string(),
        },
    }
}
