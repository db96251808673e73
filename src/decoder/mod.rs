//! Symbolic decoding of receiver histories
//!
//! # Main Types
//!
//! - [`DecodePipeline`] - Receivers, acquisition threads and the decode cycle
//! - [`DecoderStrategy`] - The pluggable decode algorithm
//! - [`DecodedSnapshot`] - Immutable result of one cycle
//! - [`DecodeDiagnostic`] - A strategy result or metadata problem that was repaired

pub mod diagnostics;
pub mod metadata;
pub mod pipeline;
pub mod reconcile;
pub mod snapshot;
pub mod strategies;
pub mod strategy;

pub use diagnostics::DecodeDiagnostic;
pub use pipeline::{AttachOptions, DecodePipeline};
pub use snapshot::{DecodedSnapshot, ReceiverSnapshot};
pub use strategy::{AnyDecoder, BuiltinDecoder, DecodeContext, DecoderStrategy};
