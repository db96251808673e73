//! Settings for receivers, decoders, the pump transmitter and the runner
//!
//! Every struct here is plain serde data with defaults, so a config file only
//! needs to name what differs from the defaults.
//!
//! # Main Types
//!
//! - [`DecoderConfig`] - Which strategy to run and which receivers feed it
//! - [`ReceiverConfig`] - Receiver type identifier plus its parameters
//! - [`TransmitterConfig`] - Pump controller connection and default pulse
//! - [`RuntimeConfig`] - Poll cadence and logging of the headless runner
//! - [`SerialConfig`] - Port name, baud rate and read timeout

use crate::actuation::PulseSpec;
use crate::decoder::strategies::{AmplitudeLevelsConfig, OnOffKeyingConfig};
use crate::receiver::simulated::SignalPattern;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Baud rate of the pump controller
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default serial read timeout in milliseconds
pub const DEFAULT_SERIAL_TIMEOUT_MS: u64 = 100;

/// Default bounded wait of one receiver read in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 100;

/// Failed reads in a row after which a receiver is considered dead
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Default decode poll rate of the runner
pub const DEFAULT_FRAMES_PER_SECOND: u32 = 25;

// ==================== Serial ====================

/// Serial port settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g. "/dev/ttyACM0" or "COM3")
    pub port: String,

    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Read timeout in milliseconds
    #[serde(default = "default_serial_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_serial_timeout_ms() -> u64 {
    DEFAULT_SERIAL_TIMEOUT_MS
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_SERIAL_TIMEOUT_MS,
        }
    }
}

// ==================== Receivers ====================

/// A receiver type identifier together with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReceiverConfig {
    /// Pattern generator, no hardware needed
    Simulated(SimulatedReceiverConfig),
    /// Sensor streaming separated values over a serial line
    Serial(SerialReceiverConfig),
}

impl ReceiverConfig {
    /// Type identifier used for generated descriptions
    pub fn type_name(&self) -> &'static str {
        match self {
            ReceiverConfig::Simulated(_) => "Simulated",
            ReceiverConfig::Serial(_) => "Serial",
        }
    }
}

/// Settings of a simulated receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedReceiverConfig {
    /// One pattern per channel
    pub channels: Vec<SignalPattern>,

    /// Channel names; generated as "ch1", "ch2", ... when empty
    #[serde(default)]
    pub channel_names: Vec<String>,

    /// Samples per second
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: f64,

    /// Peak amplitude of uniform noise added to every channel
    #[serde(default)]
    pub noise_amplitude: f64,

    /// Seed for the noise generator
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_sample_rate_hz() -> f64 {
    100.0
}

fn default_seed() -> u64 {
    12345
}

impl Default for SimulatedReceiverConfig {
    fn default() -> Self {
        Self {
            channels: vec![SignalPattern::default()],
            channel_names: Vec::new(),
            sample_rate_hz: default_sample_rate_hz(),
            noise_amplitude: 0.0,
            seed: default_seed(),
        }
    }
}

/// Settings of a serial line receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialReceiverConfig {
    /// Port settings
    pub serial: SerialConfig,

    /// One name per value on a line
    pub channel_names: Vec<String>,

    /// Value separator on a line
    #[serde(default = "default_separator")]
    pub separator: char,
}

fn default_separator() -> char {
    ','
}

// ==================== Decoder ====================

/// Decode algorithm selection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecoderKind {
    /// Raw display only, no symbolic decoding
    #[default]
    Passthrough,
    /// Binary threshold decoding with fixed symbol duration
    OnOffKeying(OnOffKeyingConfig),
    /// Multi-level amplitude decoding with fixed symbol duration
    AmplitudeLevels(AmplitudeLevelsConfig),
}

impl DecoderKind {
    /// Short name used in logs and snapshot exports
    pub fn name(&self) -> &'static str {
        match self {
            DecoderKind::Passthrough => "passthrough",
            DecoderKind::OnOffKeying(_) => "on_off_keying",
            DecoderKind::AmplitudeLevels(_) => "amplitude_levels",
        }
    }
}

/// Everything needed to attach a decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Decode algorithm
    #[serde(default)]
    pub kind: DecoderKind,

    /// Receivers feeding the decoder, in index order
    pub receivers: Vec<ReceiverConfig>,

    /// Optional human-readable receiver descriptions
    #[serde(default)]
    pub receiver_descriptions: Option<Vec<String>>,

    /// Landmark set names; the strategy's defaults when absent
    #[serde(default)]
    pub landmark_names: Option<Vec<String>>,

    /// Plot symbol per landmark set
    #[serde(default)]
    pub landmark_symbols: Option<Vec<String>>,

    /// Bounded wait of one receiver read in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Failed reads in a row after which a receiver is marked dead
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_max_consecutive_errors() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_ERRORS
}

impl DecoderConfig {
    /// Create a config with default metadata
    pub fn new(kind: DecoderKind, receivers: Vec<ReceiverConfig>) -> Self {
        Self {
            kind,
            receivers,
            receiver_descriptions: None,
            landmark_names: None,
            landmark_symbols: None,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }

    pub fn with_receiver_descriptions(mut self, descriptions: Vec<String>) -> Self {
        self.receiver_descriptions = Some(descriptions);
        self
    }

    pub fn with_landmark_names(mut self, names: Vec<String>) -> Self {
        self.landmark_names = Some(names);
        self
    }

    pub fn with_landmark_symbols(mut self, symbols: Vec<String>) -> Self {
        self.landmark_symbols = Some(symbols);
        self
    }
}

// ==================== Transmitter ====================

/// How the pump controller is reached
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransmitterLink {
    /// Real controller on a serial port
    Serial(SerialConfig),
    /// Log commands against an in-memory controller
    #[default]
    DryRun,
}

/// Pump transmitter settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransmitterConfig {
    /// Connection to the controller
    #[serde(default)]
    pub link: TransmitterLink,

    /// Pulse fired once by the runner after the decoder started
    #[serde(default)]
    pub pulse: Option<PulseSpec>,

    /// Delay before the runner fires the pulse, in seconds
    #[serde(default)]
    pub pulse_after_s: f64,
}

// ==================== Runtime ====================

/// Settings of the headless runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// How often the runner calls `decode()`
    #[serde(default = "default_frames_per_second")]
    pub frames_per_second: u32,

    /// Stop after this many seconds; run until killed when absent
    #[serde(default)]
    pub run_seconds: Option<f64>,

    /// Also write logs to a daily rolling file
    #[serde(default)]
    pub log_to_file: bool,

    /// Log directory; the app data directory when absent
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Write the final snapshot as JSON to this path
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

fn default_frames_per_second() -> u32 {
    DEFAULT_FRAMES_PER_SECOND
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frames_per_second: DEFAULT_FRAMES_PER_SECOND,
            run_seconds: None,
            log_to_file: false,
            log_dir: None,
            snapshot_path: None,
        }
    }
}

impl RuntimeConfig {
    /// Interval between two decode polls
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.frames_per_second.max(1) as f64)
    }
}
