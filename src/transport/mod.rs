//! Byte transports shared by the pump transmitter and line-based receivers
//!
//! The core only needs two operations from a transport: write a command and
//! read one response line with a timeout. Port discovery and connection
//! lifecycle stay outside of this trait.
//!
//! - [`SerialTransport`] - serial line via the `serialport` crate
//! - [`ScriptedTransport`] - in-memory transport that records writes and
//!   answers from a script, used for dry runs and tests

pub mod scripted;
pub mod serial;

pub use scripted::ScriptedTransport;
pub use serial::SerialTransport;

use crate::error::Result;
use std::time::Duration;

/// Command/response byte channel
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Write a complete command
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read one line, without its `\r\n` terminator
    ///
    /// Returns `Ok(None)` if no complete line arrived before `timeout`.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Release the underlying channel
    fn close(&mut self) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        (**self).read_line(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Strip a trailing `\n` or `\r\n` from a line
pub(crate) fn trim_line_ending(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    line
}
