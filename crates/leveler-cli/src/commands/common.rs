//! Helpers shared by the commands that open the engine.

use crate::settings::Settings;
use leveler_engine::{LevelerEngine, MeterSnapshot, RenderHost};
use leveler_io::CpalBackend;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Engine on the system's audio devices, output already running.
pub fn open_engine(settings: &Settings) -> anyhow::Result<LevelerEngine<RenderHost>> {
    let config = settings.engine.clone();
    let mut host = RenderHost::new(
        Box::new(CpalBackend::new()),
        &config.audio,
        config.metering.tap_window,
    );
    host.start_output()?;
    let mut engine = LevelerEngine::new(host, config);
    engine.observe_error(|message| eprintln!("! {message}"));
    Ok(engine)
}

/// Flag cleared by Ctrl+C.
pub fn interrupt_flag() -> anyhow::Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        flag.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

/// One-line meter readout.
pub fn format_meter(snapshot: &MeterSnapshot) -> String {
    const WIDTH: usize = 20;
    let filled = ((snapshot.gain_reduction_db / 20.0).clamp(0.0, 1.0) * WIDTH as f32) as usize;
    format!(
        "GR {:>5.1} dB [{}{}]  out {:>6.1} dBFS",
        snapshot.gain_reduction_db,
        "#".repeat(filled),
        " ".repeat(WIDTH - filled),
        snapshot.output_level_db,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_bar_tracks_reduction() {
        let idle = format_meter(&MeterSnapshot::default());
        assert!(idle.contains("GR   0.0 dB [                    ]"));
        assert!(idle.contains("-60.0 dBFS"));

        let heavy = format_meter(&MeterSnapshot {
            gain_reduction_db: 30.0,
            ..MeterSnapshot::default()
        });
        assert!(heavy.contains(&"#".repeat(20)));
    }
}
