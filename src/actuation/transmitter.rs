//! Pump controller transmitter
//!
//! Wraps a [`Transport`] with the controller protocol. All methods take
//! `&self`, so a transmitter shared behind `Arc` can be powered off from one
//! thread while another replays a pulse. The transport lock is held for one
//! command and its acknowledgement only, never across a sleep.
//!
//! The stop flag belongs to the instance: powering one controller off never
//! cancels a pulse on another.

use super::command::DEVICE_ID;
use super::{
    validate_voltages, ActuationScheduler, PulseSpec, PumpCommand, ReplayOutcome, Sleeper,
    Timeline, Voltages,
};
use crate::error::{MolcommError, Result};
use crate::transport::{ScriptedTransport, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// How long to wait for the acknowledgement line of a command
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(100);

/// Pause between the two halves of the power-off sequence
const POWER_OFF_SETTLE_MS: u64 = 100;

/// Releases the busy flag when a timed operation ends
///
/// Owns its flag, so it can move into a pulse thread.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| MolcommError::Busy)?;
        Ok(Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Raises the stop flag of a transmitter without sending anything
#[derive(Debug, Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Four-channel micropump controller
pub struct PumpTransmitter<T: Transport> {
    transport: Mutex<T>,
    stopped: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    scheduler: ActuationScheduler,
    response_timeout: Duration,
}

impl<T: Transport> PumpTransmitter<T> {
    /// Initialize a controller with real-time sleeping
    pub fn connect(transport: T) -> Result<Self> {
        Self::connect_with_scheduler(transport, ActuationScheduler::default())
    }

    /// Initialize a controller with an injected sleeper
    pub fn connect_with_sleeper(transport: T, sleeper: Arc<dyn Sleeper>) -> Result<Self> {
        Self::connect_with_scheduler(transport, ActuationScheduler::new(sleeper))
    }

    /// Identify the device, select the quad driver and power off
    ///
    /// An unexpected device identifier is only logged.
    pub fn connect_with_scheduler(transport: T, scheduler: ActuationScheduler) -> Result<Self> {
        let transmitter = Self {
            transport: Mutex::new(transport),
            stopped: Arc::new(AtomicBool::new(false)),
            busy: Arc::new(AtomicBool::new(false)),
            scheduler,
            response_timeout: RESPONSE_TIMEOUT,
        };

        let id = transmitter.send(PumpCommand::Identify)?;
        match id.as_deref() {
            Some(DEVICE_ID) => tracing::info!("Connected to {}", DEVICE_ID),
            other => tracing::warn!(
                "Unexpected device ID {:?}, is the right port selected?",
                other.unwrap_or("")
            ),
        }

        transmitter.send(PumpCommand::SelectQuadDriver)?;
        transmitter.set_state(false)?;
        Ok(transmitter)
    }

    /// Handle that cancels running pulses from anywhere
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stopped: self.stopped.clone(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Whether a timed operation is in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Power the pumps on or off
    ///
    /// Powering off raises the stop flag first, so a running pulse sends
    /// nothing after the off sequence. Powering on clears it.
    pub fn set_state(&self, on: bool) -> Result<()> {
        if on {
            self.stopped.store(false, Ordering::SeqCst);
            self.send(PumpCommand::PowerOn)?;
            tracing::info!("Pumps powered on");
        } else {
            self.stopped.store(true, Ordering::SeqCst);
            let zero = PumpCommand::set_voltages([0; 4])?;
            self.send(PumpCommand::PowerOff)?;
            self.send(zero)?;
            self.scheduler.pause_ms(POWER_OFF_SETTLE_MS);
            self.send(PumpCommand::PowerOff)?;
            self.send(zero)?;
            tracing::info!("Pumps powered off");
        }
        Ok(())
    }

    /// Set all four voltages at once
    pub fn set_all_voltages(&self, voltages: Voltages) -> Result<()> {
        self.send(PumpCommand::set_voltages(voltages)?)?;
        Ok(())
    }

    /// Apply `on` for `duration_ms`, then `off`
    ///
    /// A zero duration sends nothing. The off voltages are skipped when the
    /// transmitter was stopped during the wait.
    pub fn set_all_voltages_duration(&self, on: Voltages, off: Voltages, duration_ms: u64) -> Result<ReplayOutcome> {
        validate_voltages(&on)?;
        validate_voltages(&off)?;
        if duration_ms == 0 {
            return Ok(ReplayOutcome::Completed { issued: 0 });
        }
        let _busy = BusyGuard::acquire(&self.busy)?;

        if self.is_stopped() {
            return Ok(ReplayOutcome::Cancelled { issued: 0 });
        }
        self.set_all_voltages(on)?;
        self.scheduler.pause_ms(duration_ms);
        if self.is_stopped() {
            tracing::debug!("Timed pulse cancelled before switching off");
            return Ok(ReplayOutcome::Cancelled { issued: 1 });
        }
        self.set_all_voltages(off)?;
        Ok(ReplayOutcome::Completed { issued: 2 })
    }

    /// Pulse the selected channels at one voltage, all others at zero
    pub fn set_voltage_duration(&self, channels: [bool; 4], voltage: u16, duration_ms: u64) -> Result<ReplayOutcome> {
        let on = channels.map(|enabled| if enabled { voltage } else { 0 });
        self.set_all_voltages_duration(on, [0; 4], duration_ms)
    }

    /// Replay a staggered pulse on the calling thread
    ///
    /// Fails with [`MolcommError::Busy`] while another pulse is running.
    pub fn set_voltages_with_delay(&self, spec: &PulseSpec) -> Result<ReplayOutcome> {
        let timeline = Timeline::build(spec)?;
        if timeline.is_empty() {
            return Ok(ReplayOutcome::Completed { issued: 0 });
        }
        let _busy = BusyGuard::acquire(&self.busy)?;
        self.replay(&timeline)
    }

    /// Replay a built timeline; the caller holds the busy flag
    fn replay(&self, timeline: &Timeline) -> Result<ReplayOutcome> {
        tracing::debug!(
            "Replaying pulse: {} steps over {} ms",
            timeline.len(),
            timeline.total_ms()
        );
        let outcome = self
            .scheduler
            .replay(timeline, &self.stopped, |voltages| {
                self.send(PumpCommand::set_voltages(*voltages)?).map(|_| ())
            })?;
        if outcome.is_cancelled() {
            tracing::info!("Pulse cancelled after {} of {} steps", outcome.issued(), timeline.len());
        }
        Ok(outcome)
    }

    /// Set the drive frequency (0 to 850 Hz)
    pub fn set_frequency(&self, hz: u16) -> Result<()> {
        self.send(PumpCommand::set_frequency(hz)?)?;
        Ok(())
    }

    /// Power off and release the transport
    pub fn shutdown(&self) -> Result<()> {
        let result = self.set_state(false);
        self.lock().close();
        tracing::info!("Pump transmitter shut down");
        result
    }

    /// Write one command and read its acknowledgement line
    fn send(&self, command: PumpCommand) -> Result<Option<String>> {
        let mut transport = self.lock();
        transport.write(&command.encode())?;
        let reply = transport.read_line(self.response_timeout)?;
        drop(transport);

        match reply {
            Some(line) => {
                let line = String::from_utf8_lossy(&line).into_owned();
                tracing::trace!("{} -> {}", command, line);
                Ok(Some(line))
            }
            None => {
                tracing::debug!("No acknowledgement for {}", command);
                Ok(None)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport + 'static> PumpTransmitter<T> {
    /// Replay a pulse on a background thread
    ///
    /// The busy flag is taken before the thread starts and released when the
    /// replay ends, so a rejected request fails here rather than in the join
    /// result.
    pub fn spawn_pulse(self: &Arc<Self>, spec: PulseSpec) -> Result<JoinHandle<Result<ReplayOutcome>>> {
        let timeline = Timeline::build(&spec)?;
        let busy = if timeline.is_empty() {
            None
        } else {
            Some(BusyGuard::acquire(&self.busy)?)
        };
        let transmitter = Arc::clone(self);
        std::thread::Builder::new()
            .name("molcomm-pulse".to_string())
            .spawn(move || {
                let _busy = busy;
                if timeline.is_empty() {
                    return Ok(ReplayOutcome::Completed { issued: 0 });
                }
                transmitter.replay(&timeline)
            })
            .map_err(MolcommError::Io)
    }
}

/// Writes a dry-run controller remembers
pub const DRY_RUN_RECORD_LIMIT: usize = 256;

/// In-memory controller that identifies itself and acknowledges commands
///
/// Only the newest [`DRY_RUN_RECORD_LIMIT`] commands stay recorded.
pub fn dry_run_controller() -> ScriptedTransport {
    ScriptedTransport::new()
        .with_record_limit(DRY_RUN_RECORD_LIMIT)
        .with_responder(|command| {
            if command == PumpCommand::Identify.encode().as_slice() {
                Some(DEVICE_ID.as_bytes().to_vec())
            } else {
                Some(b"OK".to_vec())
            }
        })
}
