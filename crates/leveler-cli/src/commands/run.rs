//! Interactive real-time session.

use super::common::{format_meter, interrupt_flag, open_engine};
use crate::assistant::Assistant;
use crate::console::{Command, HELP, parse_command};
use crate::settings::Settings;
use clap::Args;
use crossbeam_channel::{Receiver, unbounded};
use leveler_core::{ControlUpdate, SourceKind};
use leveler_engine::{CaptureStatus, LevelerEngine, RenderHost};
use std::io::BufRead;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[derive(Args)]
pub struct RunArgs {
    /// Start with the signal chain powered
    #[arg(long)]
    power: bool,

    /// Initial source (tone, live, sample)
    #[arg(long, default_value = "tone")]
    source: SourceKind,

    /// Initial peak reduction (0-100)
    #[arg(long)]
    pr: Option<f32>,

    /// Initial makeup gain (0-100)
    #[arg(long)]
    gain: Option<f32>,

    /// Initial threshold in dB (-60-0)
    #[arg(long)]
    thr: Option<f32>,

    /// Seconds between meter readouts (0 disables them)
    #[arg(long, default_value = "0.5")]
    meter_every: f32,
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_status(engine: &LevelerEngine<RenderHost>) {
    let state = engine.state();
    println!(
        "power {}  bypass {}  source {}  pr {:.0}  gain {:.0}  thr {:.1} dB",
        if state.power { "on" } else { "off" },
        if state.bypass { "on" } else { "off" },
        state.source,
        state.peak_reduction,
        state.makeup_gain,
        state.threshold_db,
    );
    println!(
        "recording {}  capture {:?}",
        if engine.has_recording() { "yes" } else { "no" },
        engine.capture_status(),
    );
    println!("{}", format_meter(&engine.latest_meter()));
}

fn announce(status: &CaptureStatus) {
    match status {
        CaptureStatus::Requesting => println!("rec: waiting for the microphone"),
        CaptureStatus::Recording { remaining_seconds } => {
            println!("rec: {remaining_seconds} s left");
        }
        CaptureStatus::Decoding => println!("rec: decoding"),
        CaptureStatus::Ready => println!("rec: ready"),
        CaptureStatus::Failed { message } => println!("rec: {message}"),
        CaptureStatus::Idle => println!("rec: idle"),
    }
}

pub fn run(args: RunArgs, settings: &Settings) -> anyhow::Result<()> {
    let mut engine = open_engine(settings)?;
    let assistant = Assistant::from_env(settings.assistant.clone());

    let (status_tx, statuses) = unbounded();
    engine.observe_capture_status(move |status| {
        let _ = status_tx.send(status.clone());
    });

    // Errors from the initial update are already printed by the observer.
    let _ = engine.set_control_state(ControlUpdate {
        peak_reduction: args.pr,
        makeup_gain: args.gain,
        threshold_db: args.thr,
        source: Some(args.source),
        power: Some(args.power),
        ..ControlUpdate::default()
    });

    println!("leveler console. Type help for commands, Ctrl+C or quit to leave.");
    if !assistant.is_configured() {
        println!("(assistant offline: set LEVELER_API_KEY to enable ask)");
    }
    let running = interrupt_flag()?;
    let lines = spawn_stdin_reader();
    let frame = settings.engine.metering.interval();
    let meter_every = Duration::from_secs_f32(args.meter_every.max(0.0));
    let mut last_meter = engine.now();

    while running.load(Ordering::SeqCst) {
        while let Ok(line) = lines.try_recv() {
            match parse_command(&line) {
                Ok(Some(Command::Quit)) => running.store(false, Ordering::SeqCst),
                Ok(Some(command)) => handle(&mut engine, &assistant, command),
                Ok(None) => {}
                Err(message) => println!("? {message}"),
            }
        }

        if let Err(err) = engine.tick() {
            tracing::debug!(error = %err, "tick reported an error");
        }

        for status in statuses.try_iter() {
            announce(&status);
            // A fresh take goes straight to the speakers, as on the panel.
            if status == CaptureStatus::Ready
                && engine.state().power
                && engine.active_source() != Some(SourceKind::Sample)
            {
                let _ = engine.select_source(SourceKind::Sample);
            }
        }

        let now = engine.now();
        if !meter_every.is_zero()
            && engine.state().power
            && now.saturating_sub(last_meter) >= meter_every
        {
            println!("{}", format_meter(&engine.latest_meter()));
            last_meter = now;
        }

        std::thread::sleep(frame);
    }

    engine.shutdown();
    println!("Done!");
    Ok(())
}

fn handle(engine: &mut LevelerEngine<RenderHost>, assistant: &Assistant, command: Command) {
    // Failures reach the user through the error observer.
    let _ = match command {
        Command::Control(update) => engine.set_control_state(update),
        Command::Record => engine.request_recording(),
        Command::Stop => engine.stop_recording(),
        Command::Ask(question) => {
            let assistant = assistant.clone();
            std::thread::spawn(move || println!("\n{}\n", assistant.ask(&question)));
            Ok(())
        }
        Command::Status => {
            print_status(engine);
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => Ok(()),
    };
}
