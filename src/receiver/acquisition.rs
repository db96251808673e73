//! Acquisition thread of one receiver
//!
//! The loop reads with a bounded timeout, so a raised stop flag is noticed
//! within one read timeout. The receiver and its statistics are returned
//! when the thread is joined, so the pipeline can start again later.

use crate::error::{MolcommError, Result};
use crate::receiver::{Receiver, SampleWriter};
use crate::types::AcquisitionStats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::fmt;
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};
use std::time::{Duration, Instant};

/// Result of a thread that returns its receiver
type Finished = (Box<dyn Receiver>, AcquisitionStats);

/// A thread that could not be started, with the receiver it would have run
pub struct SpawnFailure {
    pub error: MolcommError,
    pub receiver: Box<dyn Receiver>,
}

impl fmt::Debug for SpawnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnFailure")
            .field("error", &self.error)
            .field("receiver", &self.receiver.kind())
            .finish()
    }
}

/// Everything one acquisition thread owns
pub struct AcquisitionTask {
    index: usize,
    receiver: Box<dyn Receiver>,
    writer: SampleWriter,
    epoch: Instant,
    stop: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    read_timeout: Duration,
    max_consecutive_errors: u32,
}

impl AcquisitionTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        receiver: Box<dyn Receiver>,
        writer: SampleWriter,
        epoch: Instant,
        stop: Arc<AtomicBool>,
        alive: Arc<AtomicBool>,
        read_timeout: Duration,
        max_consecutive_errors: u32,
    ) -> Self {
        Self {
            index,
            receiver,
            writer,
            epoch,
            stop,
            alive,
            read_timeout,
            max_consecutive_errors: max_consecutive_errors.max(1),
        }
    }

    /// Run the acquisition loop on the current thread
    pub fn run(mut self) -> (Box<dyn Receiver>, AcquisitionStats) {
        let mut stats = AcquisitionStats::default();
        let index = self.index;

        if let Err(e) = self.receiver.open(self.epoch) {
            tracing::error!("Receiver {} failed to open: {}", index, e);
            self.alive.store(false, Ordering::SeqCst);
            return (self.receiver, stats);
        }
        self.alive.store(true, Ordering::SeqCst);
        tracing::debug!("Acquisition for receiver {} started", index);

        while !self.stop.load(Ordering::SeqCst) {
            match self.receiver.read(self.read_timeout) {
                Ok(Some(sample)) => {
                    if !self.writer.push_sample(sample) {
                        tracing::debug!("Sample buffer of receiver {} closed", index);
                        break;
                    }
                    stats.record_sample();
                }
                Ok(None) => stats.record_timeout(),
                Err(e) => {
                    stats.record_failure();
                    tracing::warn!(
                        "Receiver {} read failed ({} in a row): {}",
                        index,
                        stats.consecutive_failures,
                        e
                    );
                    if stats.consecutive_failures >= self.max_consecutive_errors {
                        tracing::error!(
                            "Receiver {} marked dead after {} consecutive errors",
                            index,
                            stats.consecutive_failures
                        );
                        self.alive.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        }

        self.receiver.close();
        tracing::debug!(
            "Acquisition for receiver {} stopped: {} samples, {} timeouts, {} failures",
            index,
            stats.samples,
            stats.timeouts,
            stats.failed_reads
        );
        (self.receiver, stats)
    }

    /// Spawn the loop on a named thread
    ///
    /// When the thread cannot be started the receiver is handed back.
    pub fn spawn(self) -> std::result::Result<AcquisitionHandle, SpawnFailure> {
        let name = format!("molcomm-receiver-{}", self.index);
        self.spawn_on(Builder::new().name(name))
    }

    fn spawn_on(self, builder: Builder) -> std::result::Result<AcquisitionHandle, SpawnFailure> {
        let index = self.index;
        // The task only moves once the thread exists, so a failed spawn keeps it here
        let (task_tx, task_rx) = crossbeam_channel::bounded::<AcquisitionTask>(1);
        let thread = match builder.spawn(move || task_rx.recv().ok().map(AcquisitionTask::run)) {
            Ok(thread) => thread,
            Err(e) => {
                return Err(SpawnFailure {
                    error: MolcommError::Io(e),
                    receiver: self.receiver,
                })
            }
        };
        if let Err(crossbeam_channel::SendError(task)) = task_tx.send(self) {
            return Err(SpawnFailure {
                error: MolcommError::Receiver(format!("Acquisition thread {} exited early", index)),
                receiver: task.receiver,
            });
        }
        Ok(AcquisitionHandle { index, thread })
    }
}

/// Join handle of a running acquisition thread
pub struct AcquisitionHandle {
    index: usize,
    thread: JoinHandle<Option<Finished>>,
}

impl AcquisitionHandle {
    /// Receiver index this thread serves
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the thread and take back its receiver
    pub fn join(self) -> Result<Finished> {
        match self.thread.join() {
            Ok(Some(finished)) => Ok(finished),
            Ok(None) => Err(MolcommError::Receiver(format!(
                "Acquisition thread {} never received its task",
                self.index
            ))),
            Err(_) => Err(MolcommError::Receiver(format!(
                "Acquisition thread {} panicked",
                self.index
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::{sample_channel, SignalPattern, SimulatedReceiver};

    fn task(
        receiver: SimulatedReceiver,
        writer: SampleWriter,
        stop: Arc<AtomicBool>,
        alive: Arc<AtomicBool>,
    ) -> AcquisitionTask {
        AcquisitionTask::new(
            0,
            Box::new(receiver),
            writer,
            Instant::now(),
            stop,
            alive,
            Duration::from_millis(5),
            3,
        )
    }

    #[test]
    fn test_stop_flag_ends_thread_and_returns_receiver() {
        let (writer, buffer) = sample_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(false));
        let receiver = SimulatedReceiver::new(vec![SignalPattern::Constant { value: 2.0 }])
            .with_sample_rate(1000.0);

        let handle = task(receiver, writer, stop.clone(), alive.clone())
            .spawn()
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert!(alive.load(Ordering::SeqCst));

        stop.store(true, Ordering::SeqCst);
        let (receiver, stats) = handle.join().unwrap();

        let samples = buffer.drain_all();
        assert_eq!(stats.samples as usize, samples.len());
        assert!(!samples.is_empty());
        assert!(samples.iter().all(|s| s.values == vec![2.0]));
        assert_eq!(receiver.channel_names(), vec!["ch1"]);
    }

    #[test]
    fn test_consecutive_errors_mark_receiver_dead() {
        let (writer, buffer) = sample_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(false));
        let receiver = SimulatedReceiver::new(vec![SignalPattern::default()])
            .with_pacing(false)
            .with_failure_after(4);

        let (_, stats) = task(receiver, writer, stop, alive.clone()).run();

        assert!(!alive.load(Ordering::SeqCst));
        assert_eq!(stats.samples, 4);
        assert_eq!(stats.consecutive_failures, 3);
        assert_eq!(buffer.drain_all().len(), 4);
    }

    #[test]
    fn test_failed_spawn_hands_receiver_back() {
        let (writer, _buffer) = sample_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let receiver = SimulatedReceiver::new(vec![SignalPattern::default()]);
        let task = task(receiver, writer, stop.clone(), Arc::new(AtomicBool::new(false)));

        // No address space has room for this stack
        let builder = Builder::new().stack_size(usize::MAX / 2);
        match task.spawn_on(builder) {
            Err(failure) => {
                assert!(matches!(failure.error, MolcommError::Io(_)));
                assert_eq!(failure.receiver.kind(), "Simulated");
            }
            Ok(handle) => {
                stop.store(true, Ordering::SeqCst);
                let _ = handle.join();
                panic!("spawning with an impossible stack should fail");
            }
        }
    }

    #[test]
    fn test_exits_when_buffer_dropped() {
        let (writer, buffer) = sample_channel();
        drop(buffer);
        let receiver = SimulatedReceiver::new(vec![SignalPattern::default()]).with_pacing(false);

        let (_, stats) = task(
            receiver,
            writer,
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicBool::new(false)),
        )
        .run();
        assert_eq!(stats.samples, 0);
    }
}
