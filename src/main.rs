//! Molecular Communication Testbed - Headless Runner
//!
//! Attaches the configured decoder and pump transmitter, fires the configured
//! pulse once, and logs the decoded sequence as it grows.

use anyhow::Context;
use molcomm_rs::config::{self, AppConfig, RuntimeConfig};
use molcomm_rs::Testbed;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let (config, config_source) = load_config()?;
    let _log_guard = init_logging(&config.runtime)?;

    tracing::info!("Starting molecular communication testbed ({})", config_source);

    let mut testbed = Testbed::new();
    let result = run(&mut testbed, &config);

    tracing::info!("Shutting down...");
    testbed.shutdown();
    result
}

/// Config from the first argument, else the default file, else the demo
fn load_config() -> anyhow::Result<(AppConfig, String)> {
    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        let config = AppConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        return Ok((config, path.display().to_string()));
    }

    if let Some(path) = config::default_config_path().filter(|p| p.exists()) {
        let config = AppConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        return Ok((config, path.display().to_string()));
    }

    Ok((AppConfig::sample(), "built-in demo".to_string()))
}

fn init_logging(runtime: &RuntimeConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,molcomm_rs=debug"));

    let (file_layer, guard) = if runtime.log_to_file {
        let dir = match &runtime.log_dir {
            Some(dir) => dir.clone(),
            None => config::ensure_app_data_dir()?.join("logs"),
        };
        let appender = tracing_appender::rolling::daily(dir, "molcomm.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

fn run(testbed: &mut Testbed, config: &AppConfig) -> anyhow::Result<()> {
    let decoder_config = config
        .decoder
        .as_ref()
        .context("No decoder configured")?;
    testbed.add_decoder(decoder_config)?;

    for info in testbed.get_receiver_info().unwrap_or_default() {
        tracing::info!("Receiver {}: channels {:?}", info.description, info.channel_names);
    }

    let mut pending_pulse = match &config.transmitter {
        Some(transmitter_config) => {
            let transmitter = testbed.add_transmitter(transmitter_config)?;
            transmitter_config.pulse.clone().map(|pulse| {
                let due = Duration::from_secs_f64(transmitter_config.pulse_after_s.max(0.0));
                (transmitter, pulse, due)
            })
        }
        None => None,
    };
    let mut pulse_thread = None;

    testbed.start()?;
    let started = Instant::now();
    let run_for = config
        .runtime
        .run_seconds
        .map(|s| Duration::from_secs_f64(s.max(0.0)));
    let frame_interval = config.runtime.frame_interval();
    let mut last_sequence = String::new();

    loop {
        let frame_start = Instant::now();
        let elapsed = started.elapsed();

        if run_for.is_some_and(|limit| elapsed >= limit) {
            break;
        }

        if pending_pulse.as_ref().is_some_and(|(_, _, due)| elapsed >= *due) {
            if let Some((transmitter, pulse, _)) = pending_pulse.take() {
                tracing::info!("Firing pulse {:?}", pulse);
                transmitter.set_state(true)?;
                pulse_thread = Some(transmitter.spawn_pulse(pulse)?);
            }
        }

        match testbed.decode() {
            Ok(Some(snapshot)) if snapshot.sequence != last_sequence => {
                tracing::info!(
                    "Cycle {}: sequence \"{}\" ({} slots, {} samples)",
                    snapshot.cycle,
                    snapshot.sequence,
                    snapshot.slot_count(),
                    snapshot.total_samples()
                );
                last_sequence = snapshot.sequence.clone();
            }
            // Errors are logged by the pipeline and the previous snapshot stays.
            _ => {}
        }

        if let Some(decoder) = testbed.decoder() {
            for diagnostic in decoder.drain_diagnostics() {
                tracing::debug!("Diagnostic: {}", diagnostic);
            }
        }

        if let Some(remaining) = frame_interval.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    testbed.stop()?;

    if let Some(handle) = pulse_thread {
        match handle.join() {
            Ok(Ok(outcome)) => tracing::info!("Pulse finished: {:?}", outcome),
            Ok(Err(e)) => tracing::warn!("Pulse failed: {}", e),
            Err(_) => tracing::error!("Pulse thread panicked"),
        }
    }

    if let Some(snapshot) = testbed.get_decoded() {
        tracing::info!(
            "Final sequence \"{}\" after {} cycles",
            snapshot.sequence,
            snapshot.cycle
        );
        if let Some(path) = &config.runtime.snapshot_path {
            snapshot
                .export_json(path)
                .with_context(|| format!("Failed to export snapshot to {}", path.display()))?;
            tracing::info!("Snapshot written to {}", path.display());
        }
    }

    Ok(())
}
