//! Phase-accumulating sine oscillator.
//!
//! Used both as the audio-rate carrier of the test tone and as the
//! sub-audio modulator that makes the tone breathe.

use core::f32::consts::TAU;
use libm::sinf;

/// Sine oscillator with a phase in `[0, 1)`.
///
/// ```rust
/// use leveler_core::SineOscillator;
///
/// let mut osc = SineOscillator::new(48000.0, 200.0);
/// let first = osc.next_sample();
/// assert_eq!(first, 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct SineOscillator {
    phase: f32,
    phase_inc: f32,
    sample_rate: f32,
}

impl SineOscillator {
    /// Create an oscillator at `frequency_hz`, starting at phase zero.
    pub fn new(sample_rate: f32, frequency_hz: f32) -> Self {
        Self {
            phase: 0.0,
            phase_inc: frequency_hz / sample_rate,
            sample_rate,
        }
    }

    /// Frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.phase_inc * self.sample_rate
    }

    /// Change frequency without resetting phase.
    pub fn set_frequency(&mut self, frequency_hz: f32) {
        self.phase_inc = frequency_hz / self.sample_rate;
    }

    /// Change sample rate, keeping the frequency in Hz.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let freq = self.frequency();
        self.sample_rate = sample_rate;
        self.set_frequency(freq);
    }

    /// Current phase in `[0, 1)`.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Back to phase zero.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Next value in `[-1, 1]`.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let out = sinf(self.phase * TAU);
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        out
    }
}
