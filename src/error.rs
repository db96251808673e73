//! Error handling for molcomm-rs
//!
//! This module defines the crate error type and a Result alias used by the
//! receivers, the decode pipeline, the transports and the pump transmitter.

use thiserror::Error;

/// Main error type for molcomm-rs operations
#[derive(Error, Debug)]
pub enum MolcommError {
    /// Errors related to configuration loading/saving or invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by the byte transport (open, write, read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Errors raised by a receiver while acquiring samples
    #[error("Receiver error: {0}")]
    Receiver(String),

    /// A decoder strategy failed one of its steps
    #[error("Decoder strategy '{strategy}' failed in {step}: {message}")]
    Strategy {
        strategy: String,
        step: &'static str,
        message: String,
    },

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A timed actuation sequence is already running on this transmitter
    #[error("Transmitter busy: an actuation sequence is already in flight")]
    Busy,

    /// A parameter is outside its accepted range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MolcommError>,
    },
}

impl MolcommError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MolcommError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a transport error from a serial port error
    pub fn from_serial_error(err: serialport::Error) -> Self {
        MolcommError::Transport(err.to_string())
    }
}

impl From<serialport::Error> for MolcommError {
    fn from(err: serialport::Error) -> Self {
        MolcommError::from_serial_error(err)
    }
}

/// Result type alias for molcomm-rs operations
pub type Result<T> = std::result::Result<T, MolcommError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
