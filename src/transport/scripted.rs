//! Scripted in-memory transport
//!
//! Records every write and answers `read_line` from a queue of replies. A
//! responder closure can generate replies from the written command, which is
//! how the dry-run pump controller answers `ID` and acknowledges commands.
//!
//! Clones share state, so a test can keep a handle after moving the
//! transport into a transmitter or receiver. A record limit keeps only the
//! newest writes, for transports that live as long as the process.

use crate::error::{MolcommError, Result};
use crate::transport::Transport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Longest time an empty `read_line` waits before reporting a timeout
const MAX_IDLE_WAIT: Duration = Duration::from_millis(10);

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
struct ScriptState {
    written: VecDeque<Vec<u8>>,
    record_limit: Option<usize>,
    replies: VecDeque<Vec<u8>>,
    responder: Option<Responder>,
    fail_writes: bool,
    closed: bool,
}

/// Transport that records writes and replays scripted replies
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    /// Create an empty scripted transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a reply for every written command
    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        self.lock().responder = Some(Box::new(responder));
        self
    }

    /// Keep only the newest `limit` writes
    pub fn with_record_limit(self, limit: usize) -> Self {
        {
            let mut state = self.lock();
            state.record_limit = Some(limit);
            let excess = state.written.len().saturating_sub(limit);
            state.written.drain(..excess);
        }
        self
    }

    /// Queue a reply line (without terminator)
    pub fn push_reply(&self, line: impl Into<Vec<u8>>) {
        self.lock().replies.push_back(line.into());
    }

    /// Make every following write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Recorded raw writes, oldest first
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.iter().cloned().collect()
    }

    /// All writes as text with `\r\n` removed
    pub fn written_lines(&self) -> Vec<String> {
        self.lock()
            .written
            .iter()
            .map(|w| String::from_utf8_lossy(w).trim_end().to_string())
            .collect()
    }

    /// Forget recorded writes
    pub fn clear_written(&self) {
        self.lock().written.clear();
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(MolcommError::Transport("scripted write failure".to_string()));
        }
        if state.record_limit == Some(state.written.len()) {
            state.written.pop_front();
        }
        if state.record_limit != Some(0) {
            state.written.push_back(bytes.to_vec());
        }
        let reply = state.responder.as_mut().and_then(|respond| respond(bytes));
        if let Some(reply) = reply {
            state.replies.push_back(reply);
        }
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        if let Some(line) = self.lock().replies.pop_front() {
            return Ok(Some(line));
        }
        std::thread::sleep(timeout.min(MAX_IDLE_WAIT));
        Ok(self.lock().replies.pop_front())
    }

    fn close(&mut self) {
        self.lock().closed = true;
    }
}
