//! Record a take and loop it through the leveler.

use super::common::{format_meter, interrupt_flag, open_engine};
use crate::settings::Settings;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use leveler_core::{ControlUpdate, SourceKind};
use leveler_engine::CaptureStatus;
use leveler_io::{WavSpec, write_wav};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[derive(Args)]
pub struct RecordArgs {
    /// Stop after this many seconds (capped by the capture limit)
    #[arg(short, long)]
    seconds: Option<u32>,

    /// Seconds to loop the take through the leveler afterwards
    #[arg(long, default_value = "10")]
    play: f32,

    /// Also write the raw take to this WAV file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Peak reduction for playback (0-100)
    #[arg(long)]
    pr: Option<f32>,

    /// Makeup gain for playback (0-100)
    #[arg(long)]
    gain: Option<f32>,
}

pub fn run(args: RecordArgs, settings: &Settings) -> anyhow::Result<()> {
    let limit = settings.engine.capture.max_seconds;
    let seconds = args.seconds.unwrap_or(limit).clamp(1, limit);
    let frame = settings.engine.metering.interval();

    let mut engine = open_engine(settings)?;
    let running = interrupt_flag()?;

    let bar = ProgressBar::new(u64::from(seconds));
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} s {msg}")?
            .progress_chars("=>-"),
    );
    bar.set_message("waiting for the microphone");

    engine.request_recording()?;
    let started = engine.now();
    loop {
        if !running.load(Ordering::SeqCst) {
            engine.stop_recording()?;
        }
        let _ = engine.tick();
        match engine.capture_status() {
            CaptureStatus::Recording { remaining_seconds } => {
                bar.set_message("recording");
                bar.set_position(u64::from(limit.saturating_sub(*remaining_seconds)));
                if engine.now().saturating_sub(started) >= Duration::from_secs(u64::from(seconds))
                {
                    engine.stop_recording()?;
                }
            }
            CaptureStatus::Ready => break,
            CaptureStatus::Failed { message } => {
                bar.abandon_with_message(message.clone());
                anyhow::bail!("recording failed: {message}");
            }
            CaptureStatus::Idle => {
                bar.abandon_with_message("cancelled");
                return Ok(());
            }
            CaptureStatus::Requesting | CaptureStatus::Decoding => {}
        }
        std::thread::sleep(frame);
    }
    bar.finish_with_message("done");

    let take = engine
        .recording()
        .map(Arc::clone)
        .ok_or_else(|| anyhow::anyhow!("no recording was produced"))?;
    println!(
        "Recorded {:.2} s at {} Hz",
        take.duration_secs(),
        take.sample_rate
    );

    if let Some(path) = &args.save {
        let spec = WavSpec {
            channels: 1,
            sample_rate: take.sample_rate,
            bits_per_sample: 32,
        };
        write_wav(path, &take.samples, spec)?;
        println!("Saved take to {}", path.display());
    }

    if !running.load(Ordering::SeqCst) || args.play <= 0.0 {
        engine.shutdown();
        return Ok(());
    }

    engine.set_control_state(ControlUpdate {
        peak_reduction: args.pr,
        makeup_gain: args.gain,
        source: Some(SourceKind::Sample),
        power: Some(true),
        ..ControlUpdate::default()
    })?;
    println!("Playing the take through the leveler. Press Ctrl+C to stop...");

    let until = engine.now() + Duration::from_secs_f32(args.play);
    let mut last_print = engine.now();
    while running.load(Ordering::SeqCst) && engine.now() < until {
        let _ = engine.tick();
        if engine.now().saturating_sub(last_print) >= Duration::from_millis(500) {
            println!("{}", format_meter(&engine.latest_meter()));
            last_print = engine.now();
        }
        std::thread::sleep(frame);
    }

    engine.shutdown();
    println!("Done!");
    Ok(())
}
