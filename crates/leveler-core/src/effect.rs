//! The per-sample processing trait and the smoothed gain stage.
//!
//! Every node between the source and the analysis tap is an [`Effect`]:
//! mono in, mono out, no allocation. The gain nodes of the leveler (input
//! drive, makeup, wet and dry) are all [`GainStage`]s whose level is a
//! [`SmoothedParam`].

use crate::param::SmoothedParam;

/// Mono audio processor.
///
/// ```rust
/// use leveler_core::Effect;
///
/// struct Invert;
///
/// impl Effect for Invert {
///     fn process(&mut self, input: f32) -> f32 {
///         -input
///     }
///
///     fn set_sample_rate(&mut self, _sample_rate: f32) {}
///
///     fn reset(&mut self) {}
/// }
///
/// let mut buf = [0.5, -0.25];
/// Invert.process_block_inplace(&mut buf);
/// assert_eq!(buf, [-0.5, 0.25]);
/// ```
pub trait Effect {
    /// Process one sample.
    fn process(&mut self, input: f32) -> f32;

    /// Process a block in place. Defaults to calling [`process`](Self::process)
    /// per sample.
    fn process_block_inplace(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Recompute anything that depends on the sample rate.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Clear internal state without touching parameters.
    fn reset(&mut self);

    /// Latency introduced, in samples.
    fn latency_samples(&self) -> usize {
        0
    }
}

/// Linear gain with a smoothed level.
#[derive(Debug, Clone)]
pub struct GainStage {
    level: SmoothedParam,
}

impl GainStage {
    /// Create a stage at `initial` linear gain.
    pub fn new(initial: f32, sample_rate: f32) -> Self {
        Self {
            level: SmoothedParam::with_time_constant(initial, sample_rate, 0.0),
        }
    }

    /// Approach `target` with the given time constant in seconds.
    pub fn ramp_to(&mut self, target: f32, time_constant_s: f32) {
        self.level.ramp_to(target, time_constant_s);
    }

    /// Current (smoothed) gain.
    pub fn level(&self) -> f32 {
        self.level.get()
    }

    /// Gain being approached.
    pub fn target(&self) -> f32 {
        self.level.target()
    }
}

impl Effect for GainStage {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        input * self.level.advance()
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.level.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.level.snap_to_target();
    }
}
