//! Offline render through the leveler, no audio hardware needed.

use crate::settings::Settings;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use leveler_core::{ControlUpdate, SourceKind};
use leveler_engine::{LevelerEngine, ManualClock, MeterSnapshot, RenderHost};
use leveler_io::{MockBackend, WavSpec, read_wav, write_wav};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Seconds to render
    #[arg(long, default_value = "5.0")]
    seconds: f32,

    /// Loop this WAV file instead of the test tone (first seconds only, up to
    /// the capture limit)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Peak reduction (0-100)
    #[arg(long)]
    pr: Option<f32>,

    /// Makeup gain (0-100)
    #[arg(long)]
    gain: Option<f32>,

    /// Threshold in dB (-60-0)
    #[arg(long)]
    thr: Option<f32>,

    /// Render with the dry signal
    #[arg(long)]
    bypass: bool,

    /// Print the meter summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    seconds: f32,
    sample_rate: u32,
    source: SourceKind,
    readings: usize,
    peak_gain_reduction_db: f32,
    mean_gain_reduction_db: f32,
    last: MeterSnapshot,
}

impl Summary {
    fn new(seconds: f32, sample_rate: u32, source: SourceKind, meters: &[MeterSnapshot]) -> Self {
        let peak = meters
            .iter()
            .map(|m| m.gain_reduction_db)
            .fold(0.0_f32, f32::max);
        let mean = if meters.is_empty() {
            0.0
        } else {
            meters.iter().map(|m| m.gain_reduction_db).sum::<f32>() / meters.len() as f32
        };
        Self {
            seconds,
            sample_rate,
            source,
            readings: meters.len(),
            peak_gain_reduction_db: peak,
            mean_gain_reduction_db: mean,
            last: meters.last().copied().unwrap_or_default(),
        }
    }
}

/// Push `samples` through the capture path so they become the recording.
fn load_take(
    engine: &mut LevelerEngine<RenderHost>,
    backend: &MockBackend,
    clock: &ManualClock,
    samples: &[f32],
    block: usize,
    sample_rate: u32,
) -> anyhow::Result<()> {
    engine.request_recording()?;
    for chunk in samples.chunks(block) {
        backend.feed_input(chunk);
        clock.advance(Duration::from_secs_f64(
            chunk.len() as f64 / f64::from(sample_rate),
        ));
        engine.tick()?;
    }
    engine.stop_recording()?;
    if !engine.has_recording() {
        anyhow::bail!("input could not be loaded as a recording");
    }
    Ok(())
}

pub fn run(args: RenderArgs, settings: &Settings) -> anyhow::Result<()> {
    if !(args.seconds > 0.0) {
        anyhow::bail!("--seconds must be positive");
    }
    let mut config = settings.engine.clone();

    let input = match &args.input {
        Some(path) => {
            let (mut samples, spec) = read_wav(path)?;
            let limit = spec.sample_rate as usize * config.capture.max_seconds as usize;
            if samples.len() > limit {
                println!(
                    "Input is longer than {} s; using the first {} s",
                    config.capture.max_seconds, config.capture.max_seconds
                );
                samples.truncate(limit);
            }
            config.audio.sample_rate = spec.sample_rate;
            Some(samples)
        }
        None => None,
    };
    let sample_rate = config.audio.sample_rate;
    let block = ((sample_rate as f32 / config.metering.refresh_hz) as usize).max(1);

    let backend = MockBackend::new(sample_rate);
    let mut host = RenderHost::new(
        Box::new(backend.clone()),
        &config.audio,
        config.metering.tap_window,
    );
    host.start_output()?;
    let clock = ManualClock::new();
    let mut engine = LevelerEngine::with_clock(host, config, clock.clone());
    let meters = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&meters);
    engine.observe(move |snap| sink.lock().push(*snap));

    let source = match &input {
        Some(samples) => {
            load_take(&mut engine, &backend, &clock, samples, block, sample_rate)?;
            SourceKind::Sample
        }
        None => SourceKind::Tone,
    };

    engine.set_control_state(ControlUpdate {
        peak_reduction: args.pr,
        makeup_gain: args.gain,
        threshold_db: args.thr,
        bypass: Some(args.bypass),
        source: Some(source),
        power: Some(true),
    })?;

    let total = (args.seconds * sample_rate as f32) as usize;
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {percent}% ({eta})")?
            .progress_chars("=>-"),
    );

    let mut rendered = Vec::with_capacity(total);
    while rendered.len() < total {
        let frames = block.min(total - rendered.len());
        let interleaved = backend.pull_output(frames);
        rendered.extend(interleaved.chunks(2).map(|frame| frame[0]));
        clock.advance(Duration::from_secs_f64(
            frames as f64 / f64::from(sample_rate),
        ));
        engine.tick()?;
        bar.set_position(rendered.len() as u64);
    }
    bar.finish_and_clear();
    engine.shutdown();

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
    };
    write_wav(&args.output, &rendered, spec)?;
    tracing::info!(path = %args.output.display(), frames = rendered.len(), "render written");

    let summary = Summary::new(args.seconds, sample_rate, source, &meters.lock());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Rendered {:.2} s of {} to {}", args.seconds, source, args.output.display());
        println!("  Readings: {}", summary.readings);
        println!("  Peak gain reduction: {:.1} dB", summary.peak_gain_reduction_db);
        println!("  Mean gain reduction: {:.1} dB", summary.mean_gain_reduction_db);
        println!("  Output level: {:.1} dBFS", summary.last.output_level_db);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_nothing_is_quiet() {
        let summary = Summary::new(1.0, 48000, SourceKind::Tone, &[]);
        assert_eq!(summary.readings, 0);
        assert_eq!(summary.peak_gain_reduction_db, 0.0);
        assert_eq!(summary.last, MeterSnapshot::default());
    }

    #[test]
    fn summary_tracks_peak_and_mean() {
        let reading = |gr| MeterSnapshot {
            gain_reduction_db: gr,
            ..MeterSnapshot::default()
        };
        let summary = Summary::new(
            1.0,
            48000,
            SourceKind::Tone,
            &[reading(2.0), reading(6.0), reading(4.0)],
        );
        assert_eq!(summary.peak_gain_reduction_db, 6.0);
        assert_eq!(summary.mean_gain_reduction_db, 4.0);
        assert_eq!(summary.last.gain_reduction_db, 4.0);
    }
}
