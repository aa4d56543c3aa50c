//! Breathing test tone.
//!
//! A sine carrier through a gain stage whose level is swung by a slow sine
//! LFO. The result pulses across the threshold, which makes the leveler's
//! gain reduction visibly move without any external input.
//!
//! ```text
//! carrier (200 Hz) ──► × (level + depth · lfo) ──► out
//!                              ▲
//!                      lfo (2 Hz)
//! ```

use leveler_core::SineOscillator;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tone generator characteristics.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ToneSettings {
    /// Carrier frequency in Hz.
    pub frequency_hz: f32,
    /// Modulator frequency in Hz.
    pub lfo_hz: f32,
    /// Carrier level with the modulator at zero.
    pub level: f32,
    /// Modulator depth added to the level.
    pub depth: f32,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 200.0,
            lfo_hz: 2.0,
            level: 0.6,
            depth: 0.3,
        }
    }
}

impl ToneSettings {
    /// Largest absolute sample the tone can produce.
    pub fn peak(&self) -> f32 {
        (self.level.abs() + self.depth.abs()).max((self.level - self.depth).abs())
    }
}

/// Carrier and modulator that always run together.
#[derive(Debug, Clone)]
pub struct ModulatedTone {
    settings: ToneSettings,
    carrier: SineOscillator,
    lfo: SineOscillator,
    running: bool,
}

impl ModulatedTone {
    /// Create a stopped tone.
    pub fn new(sample_rate: f32, settings: ToneSettings) -> Self {
        Self {
            settings,
            carrier: SineOscillator::new(sample_rate, settings.frequency_hz),
            lfo: SineOscillator::new(sample_rate, settings.lfo_hz),
            running: false,
        }
    }

    /// Start both oscillators from phase zero.
    pub fn start(&mut self) {
        self.carrier.reset();
        self.lfo.reset();
        self.running = true;
    }

    /// Stop both oscillators. Output is silent until restarted.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether the tone is sounding.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Characteristics in use.
    pub fn settings(&self) -> &ToneSettings {
        &self.settings
    }

    /// Change sample rate without retuning.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.carrier.set_sample_rate(sample_rate);
        self.lfo.set_sample_rate(sample_rate);
    }

    /// Next output sample.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if !self.running {
            return 0.0;
        }
        let gain = self.settings.level + self.settings.depth * self.lfo.next_sample();
        self.carrier.next_sample() * gain
    }

    /// Fill `out` with the next samples.
    pub fn fill(&mut self, out: &mut [f32]) {
        for s in out.iter_mut() {
            *s = self.next_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_tone_is_silent() {
        let mut tone = ModulatedTone::new(48000.0, ToneSettings::default());
        assert!(!tone.is_running());
        assert_eq!(tone.next_sample(), 0.0);
    }

    #[test]
    fn output_stays_within_level_plus_depth() {
        let mut tone = ModulatedTone::new(48000.0, ToneSettings::default());
        tone.start();
        let mut peak = 0.0f32;
        for _ in 0..48000 {
            peak = peak.max(tone.next_sample().abs());
        }
        assert!(peak <= 0.9 + 1e-4);
        assert!(peak > 0.85, "peak {peak}");
    }

    #[test]
    fn envelope_breathes_at_lfo_rate() {
        let mut tone = ModulatedTone::new(48000.0, ToneSettings::default());
        tone.start();
        let mut buf = [0.0f32; 48000];
        tone.fill(&mut buf);
        // LFO peak at 125 ms, trough at 375 ms; carrier period is 240 samples
        let window_peak = |center: usize| {
            buf[center - 120..center + 120]
                .iter()
                .fold(0.0f32, |m, s| m.max(s.abs()))
        };
        let loud = window_peak(6000);
        let soft = window_peak(18000);
        assert!((loud - 0.9).abs() < 0.02, "loud {loud}");
        assert!((soft - 0.3).abs() < 0.02, "soft {soft}");
    }

    #[test]
    fn stop_and_restart_resets_phase() {
        let mut tone = ModulatedTone::new(48000.0, ToneSettings::default());
        tone.start();
        let first: [f32; 4] = core::array::from_fn(|_| tone.next_sample());
        tone.stop();
        tone.start();
        let again: [f32; 4] = core::array::from_fn(|_| tone.next_sample());
        assert_eq!(first, again);
    }

    #[test]
    fn peak_accounts_for_depth() {
        assert!((ToneSettings::default().peak() - 0.9).abs() < 1e-6);
    }
}
