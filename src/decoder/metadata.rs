//! Receiver descriptions and landmark symbols resolved at attach
//!
//! Bad metadata is never fatal: missing entries get generated defaults and
//! mismatched ones are replaced and reported.

use super::diagnostics::DecodeDiagnostic;
use crate::types::{LandmarkInfo, DEFAULT_LANDMARK_SYMBOL};

/// Descriptions for `type_names.len()` receivers
///
/// Without descriptions each receiver is called `"{type}{index + 1}"`.
pub fn resolve_receiver_descriptions(
    type_names: &[&str],
    provided: Option<&[String]>,
) -> (Vec<String>, Option<DecodeDiagnostic>) {
    let generated = || {
        type_names
            .iter()
            .enumerate()
            .map(|(i, ty)| format!("{}{}", ty, i + 1))
            .collect::<Vec<_>>()
    };

    match provided {
        None => {
            tracing::info!("No receiver descriptions given, using generated descriptions");
            (generated(), None)
        }
        Some(descriptions) if descriptions.len() == type_names.len() => {
            (descriptions.to_vec(), None)
        }
        Some(descriptions) => (
            generated(),
            Some(DecodeDiagnostic::ReceiverDescriptionsMismatch {
                receivers: type_names.len(),
                descriptions: descriptions.len(),
            }),
        ),
    }
}

/// Landmark names with one plot symbol each
///
/// Missing symbols default to `'o'` quietly; symbols of the wrong length
/// default to `'o'` and are reported.
pub fn resolve_landmark_info(
    names: Vec<String>,
    symbols: Option<&[String]>,
) -> (LandmarkInfo, Option<DecodeDiagnostic>) {
    let fallback = || vec![DEFAULT_LANDMARK_SYMBOL.to_string(); names.len()];

    let (symbols, diagnostic) = match symbols {
        None => {
            tracing::info!("No landmark symbols given, using '{}'", DEFAULT_LANDMARK_SYMBOL);
            (fallback(), None)
        }
        Some(symbols) if symbols.len() == names.len() => (symbols.to_vec(), None),
        Some(symbols) => (
            fallback(),
            Some(DecodeDiagnostic::LandmarkSymbolsMismatch {
                names: names.len(),
                symbols: symbols.len(),
            }),
        ),
    };

    (LandmarkInfo { names, symbols }, diagnostic)
}
