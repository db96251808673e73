//! Mock construction helpers

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use molcomm_rs::actuation::{dry_run_controller, PumpTransmitter, Sleeper};
use molcomm_rs::transport::ScriptedTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sleeper that returns immediately and records every requested delay
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<u64>>,
}

impl RecordingSleeper {
    pub fn sleeps_ms(&self) -> Vec<u64> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration.as_millis() as u64);
    }
}

/// Sleeper that, once armed, parks every sleep until the test releases it
///
/// Each parked sleep announces itself on `entered` before waiting.
pub struct GatedSleeper {
    armed: Arc<AtomicBool>,
    entered_tx: Sender<Duration>,
    release_rx: Receiver<()>,
}

/// Test side of a [`GatedSleeper`]
pub struct Gate {
    armed: Arc<AtomicBool>,
    pub entered: Receiver<Duration>,
    release: Sender<()>,
}

impl Gate {
    /// Start parking sleeps; before this they return immediately
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Let one parked sleep return
    pub fn release_one(&self) {
        self.release.send(()).unwrap();
    }

    /// Wait until a sleep is parked
    pub fn wait_entered(&self) -> Duration {
        self.entered
            .recv_timeout(Duration::from_secs(5))
            .expect("no sleep reached the gate")
    }
}

pub fn gated_sleeper() -> (Arc<GatedSleeper>, Gate) {
    let (entered_tx, entered) = unbounded();
    let (release, release_rx) = bounded(16);
    let armed = Arc::new(AtomicBool::new(false));
    (
        Arc::new(GatedSleeper {
            armed: armed.clone(),
            entered_tx,
            release_rx,
        }),
        Gate {
            armed,
            entered,
            release,
        },
    )
}

impl Sleeper for GatedSleeper {
    fn sleep(&self, duration: Duration) {
        if !self.armed.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.entered_tx.send(duration);
        let _ = self.release_rx.recv_timeout(Duration::from_secs(5));
    }
}

/// Dry-run transmitter plus a handle on its transport
pub fn dry_run_transmitter(sleeper: Arc<dyn Sleeper>) -> (Arc<PumpTransmitter<ScriptedTransport>>, ScriptedTransport) {
    let transport = dry_run_controller();
    let transmitter = PumpTransmitter::connect_with_sleeper(transport.clone(), sleeper).unwrap();
    transport.clear_written();
    (Arc::new(transmitter), transport)
}
