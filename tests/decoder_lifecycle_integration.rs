//! Integration tests for the decoder lifecycle
//!
//! These tests validate the complete decode workflow:
//! - Attach from config, start, periodic decode, stop
//! - Restart without losing history
//! - Dead receivers and metadata fallbacks
//! - Repair of misbehaving strategies

mod common;

use common::builders::{on_off_keying_config, MessageReceiverBuilder};
use molcomm_rs::config::{DecoderConfig, DecoderKind};
use molcomm_rs::decoder::strategies::AmplitudeLevelsConfig;
use molcomm_rs::decoder::{
    AnyDecoder, AttachOptions, BuiltinDecoder, DecodeContext, DecodeDiagnostic, DecodePipeline,
    DecoderStrategy,
};
use molcomm_rs::receiver::Receiver;
use molcomm_rs::types::{DecoderState, SymbolValue};
use molcomm_rs::{Result, Testbed};
use std::thread;
use std::time::Duration;

const MESSAGE: [u32; 8] = [1, 0, 1, 1, 0, 0, 1, 0];

#[test]
fn test_on_off_keying_decodes_live_message() {
    let receiver = MessageReceiverBuilder::new(&MESSAGE);
    let run_for = receiver.message_end() + 0.15;
    let config = on_off_keying_config(0.05, vec![receiver.build_config()]);

    let mut testbed = Testbed::new();
    testbed.add_decoder(&config).unwrap();
    testbed.start().unwrap();

    let mut previous = testbed.get_decoded().unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs_f64(run_for);
    while std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
        let snapshot = testbed.decode().unwrap().unwrap();

        // Exposed decode only ever grows
        assert!(snapshot.symbol_intervals.starts_with(&previous.symbol_intervals));
        assert!(snapshot.sequence.starts_with(&previous.sequence));
        if !snapshot.symbol_intervals.is_empty() {
            assert_eq!(snapshot.symbol_values.len(), snapshot.symbol_intervals.len() - 1);
        }
        previous = snapshot;
    }

    testbed.stop().unwrap();
    let snapshot = testbed.decode().unwrap().unwrap();

    assert!(
        snapshot.sequence.starts_with("10110010"),
        "decoded {:?}",
        snapshot.sequence
    );
    common::assert_float_eq(snapshot.symbol_intervals[0], 0.05, 1e-6);
    assert_eq!(snapshot.landmark_info.names, vec!["Rising edges", "Falling edges"]);
    assert_eq!(snapshot.landmarks.len(), 2);
    assert_eq!(snapshot.landmarks[0].len(), 3);
    assert_eq!(snapshot.receivers[0].info.description, "Simulated1");
    assert_eq!(snapshot.receivers[0].info.channel_names, vec!["concentration"]);
}

#[test]
fn test_amplitude_levels_decodes_live_message() {
    let receiver = MessageReceiverBuilder::new(&[3, 1, 2, 0, 3]);
    let run_for = receiver.message_end() + 0.1;
    let config = DecoderConfig::new(
        DecoderKind::AmplitudeLevels(AmplitudeLevelsConfig {
            channel: 0,
            levels: 4,
            level_step: 1.0,
            symbol_duration_s: 0.05,
            sync_threshold: 0.5,
        }),
        vec![receiver.build_config()],
    );

    let mut pipeline = DecodePipeline::attach(&config).unwrap();
    pipeline.start().unwrap();
    thread::sleep(Duration::from_secs_f64(run_for));
    pipeline.stop().unwrap();

    let snapshot = pipeline.decode().unwrap();
    assert!(snapshot.sequence.starts_with("31203"), "decoded {:?}", snapshot.sequence);
}

#[test]
fn test_restart_keeps_history_in_order() {
    let config = on_off_keying_config(0.05, vec![MessageReceiverBuilder::new(&MESSAGE).build_config()]);
    let mut pipeline = DecodePipeline::attach(&config).unwrap();

    pipeline.start().unwrap();
    thread::sleep(Duration::from_millis(60));
    pipeline.stop().unwrap();
    let first = pipeline.decode().unwrap();
    let first_len = first.receivers[0].history.len();
    assert!(first_len > 0);

    // Time passes while idle; the stream resumes without going back
    thread::sleep(Duration::from_millis(30));
    pipeline.start().unwrap();
    assert_eq!(pipeline.state(), DecoderState::Active);
    thread::sleep(Duration::from_millis(60));
    pipeline.stop().unwrap();
    let second = pipeline.decode().unwrap();

    let history = &second.receivers[0].history;
    assert!(history.len() > first_len);
    let timestamps: Vec<f64> = history.timestamps().collect();
    assert_eq!(
        timestamps[..first_len],
        first.receivers[0].history.timestamps().collect::<Vec<_>>()[..]
    );
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    assert!(second.sequence.starts_with(&first.sequence));
    assert!(pipeline.acquisition_stats()[0].samples > 0);
}

#[test]
fn test_dead_receiver_is_reported_once() {
    let receiver: Box<dyn Receiver> = Box::new(MessageReceiverBuilder::new(&MESSAGE).fail_after(20).build());
    let options = AttachOptions {
        read_timeout: Duration::from_millis(10),
        max_consecutive_errors: 3,
        ..AttachOptions::default()
    };
    let mut pipeline = DecodePipeline::attach_with(
        AnyDecoder::from(BuiltinDecoder::from_kind(&DecoderKind::Passthrough)),
        vec![receiver],
        options,
    )
    .unwrap();
    let diagnostics = pipeline.diagnostics();

    pipeline.start().unwrap();
    assert!(common::wait_until(Duration::from_secs(2), || {
        pipeline.receiver_alive(0) == Some(false)
    }));

    let snapshot = pipeline.decode().unwrap();
    assert!(!snapshot.receivers[0].alive);
    assert_eq!(snapshot.receivers[0].history.len(), 20);

    let reported: Vec<_> = diagnostics.try_iter().collect();
    assert!(reported.contains(&DecodeDiagnostic::ReceiverDead {
        receiver: 0,
        description: "Simulated1".to_string(),
    }));

    pipeline.decode().unwrap();
    assert!(diagnostics.try_iter().next().is_none());

    // The finished thread still hands its receiver back
    pipeline.stop().unwrap();
    assert_eq!(pipeline.acquisition_stats()[0].samples, 20);
}

#[test]
fn test_metadata_fallbacks_are_reported() {
    let config = on_off_keying_config(
        0.05,
        vec![MessageReceiverBuilder::new(&MESSAGE).build_config()],
    )
    .with_receiver_descriptions(vec!["left".to_string(), "right".to_string()])
    .with_landmark_symbols(vec!["^".to_string()]);

    let pipeline = DecodePipeline::attach(&config).unwrap();

    assert_eq!(pipeline.get_receiver_info()[0].description, "Simulated1");
    assert_eq!(pipeline.get_landmark_info().symbols, vec!["o", "o"]);

    let reported = pipeline.drain_diagnostics();
    assert!(reported.contains(&DecodeDiagnostic::ReceiverDescriptionsMismatch {
        receivers: 1,
        descriptions: 2,
    }));
    assert!(reported.contains(&DecodeDiagnostic::LandmarkSymbolsMismatch {
        names: 2,
        symbols: 1,
    }));
}

#[test]
fn test_invalid_strategy_config_fails_attach() {
    let mut config = on_off_keying_config(0.05, vec![MessageReceiverBuilder::new(&MESSAGE).build_config()]);
    if let DecoderKind::OnOffKeying(ook) = &mut config.kind {
        ook.channel = 4;
    }
    let mut testbed = Testbed::new();
    assert!(testbed.add_decoder(&config).is_err());
    assert!(testbed.decoder().is_none());
}

/// Rewrites its intervals and retracts its sequence on the second cycle
struct Unruly;

impl DecoderStrategy for Unruly {
    fn name(&self) -> &str {
        "unruly"
    }

    fn calculate_symbol_intervals(&mut self, ctx: &DecodeContext) -> Result<Vec<f64>> {
        Ok(match ctx.cycle {
            0 => vec![],
            1 => vec![0.0, 1.0, 2.0],
            _ => vec![0.5, 1.0, 2.0, 3.0],
        })
    }

    fn calculate_symbol_values(&mut self, ctx: &DecodeContext) -> Result<Vec<SymbolValue>> {
        Ok(match ctx.cycle {
            0 => vec![],
            1 => vec![1, 1],
            _ => vec![1, 1, 0],
        })
    }

    fn calculate_sequence(&mut self, ctx: &DecodeContext) -> Result<String> {
        Ok(match ctx.cycle {
            0 => String::new(),
            1 => "11".to_string(),
            _ => "10".to_string(),
        })
    }
}

#[test]
fn test_misbehaving_strategy_is_repaired() {
    let receiver: Box<dyn Receiver> = Box::new(MessageReceiverBuilder::new(&MESSAGE).build());
    let mut pipeline =
        DecodePipeline::attach_with(AnyDecoder::plugin(Unruly), vec![receiver], AttachOptions::default())
            .unwrap();

    let first = pipeline.decode().unwrap();
    assert_eq!(first.symbol_intervals, vec![0.0, 1.0, 2.0]);
    assert_eq!(first.sequence, "11");
    assert!(pipeline.drain_diagnostics().is_empty());

    let second = pipeline.decode().unwrap();
    assert_eq!(second.symbol_intervals, vec![0.0, 1.0, 2.0]);
    assert_eq!(second.symbol_values, vec![1, 1]);
    assert_eq!(second.sequence, "11");

    let reported = pipeline.drain_diagnostics();
    assert!(reported
        .iter()
        .any(|d| matches!(d, DecodeDiagnostic::IntervalsRewritten { cycle: 2, .. })));
    assert!(reported
        .iter()
        .any(|d| matches!(d, DecodeDiagnostic::SymbolValuesTruncated { cycle: 2, .. })));
    assert!(reported.contains(&DecodeDiagnostic::SequenceRetracted { cycle: 2 }));
}

#[test]
fn test_snapshot_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    let receiver: Box<dyn Receiver> = Box::new(MessageReceiverBuilder::new(&MESSAGE).build());
    let mut pipeline =
        DecodePipeline::attach_with(AnyDecoder::plugin(Unruly), vec![receiver], AttachOptions::default())
            .unwrap();

    pipeline.decode().unwrap().export_json(&path).unwrap();

    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["strategy"], "unruly");
    assert_eq!(value["sequence"], "11");
    assert_eq!(value["cycle"], 1);
}
