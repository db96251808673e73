//! # molcomm-rs: Molecular Communication Testbed
//!
//! Live symbolic decoding of chemical-concentration receivers, plus timed
//! voltage sequences on a four-channel micropump controller.
//!
//! ## Architecture
//!
//! - **Receivers**: one acquisition thread per receiver feeds a lock-free
//!   sample queue; the decode cycle drains the queues into per-receiver
//!   histories
//! - **Decoder**: a pluggable strategy turns histories into landmarks,
//!   symbol intervals, symbol values and a decoded sequence; results are
//!   repaired so the exposed decode only ever grows
//! - **Actuation**: pulse specs are compiled into voltage timelines and
//!   replayed against the pump controller, cancellable between steps
//! - **Transport**: line-oriented byte I/O over a serial port, or a
//!   scripted in-memory device
//!
//! ## Configuration
//!
//! The runner reads `molcomm.toml` from the platform data directory under
//! `dev.molcomm.molcomm-rs`, or a TOML/JSON file given on the command line.
//!
//! ## Example
//!
//! ```ignore
//! use molcomm_rs::{config::AppConfig, Testbed};
//!
//! let config = AppConfig::sample();
//! let mut testbed = Testbed::new();
//! testbed.add_decoder(config.decoder.as_ref().unwrap())?;
//! testbed.start()?;
//!
//! loop {
//!     if let Some(snapshot) = testbed.decode()? {
//!         println!("{}", snapshot.sequence);
//!     }
//!     std::thread::sleep(config.runtime.frame_interval());
//! }
//! ```

pub mod actuation;
pub mod config;
pub mod decoder;
pub mod error;
pub mod receiver;
pub mod testbed;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use actuation::{PulseSpec, PumpTransmitter, ReplayOutcome, Timeline};
pub use config::{AppConfig, DecoderConfig, TransmitterConfig};
pub use decoder::{AnyDecoder, DecodePipeline, DecodedSnapshot, DecoderStrategy};
pub use error::{MolcommError, Result};
pub use receiver::Receiver;
pub use testbed::Testbed;
pub use types::{DecoderState, Landmark, LandmarkInfo, ReceiverInfo, Sample};
