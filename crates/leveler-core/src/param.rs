//! Exponentially smoothed parameters.
//!
//! Every control write in the leveler is a smoothed approach toward a target,
//! expressed as a time constant: after one time constant the value has
//! covered 63.2% of the distance, after five it is effectively settled. This
//! is the same contract as a "set target at time" automation event.
//!
//! ```rust
//! use leveler_core::SmoothedParam;
//!
//! let mut drive = SmoothedParam::with_time_constant(0.0, 48000.0, 0.1);
//! drive.ramp_to(3.0, 0.1);
//!
//! // 100 ms later the drive is at ~63% of the way to 3.0
//! let mut value = 0.0;
//! for _ in 0..4800 {
//!     value = drive.advance();
//! }
//! assert!((value - 3.0 * 0.632).abs() < 0.01);
//! ```

use libm::expf;

/// Distance at which a value counts as having arrived.
const SETTLE_EPSILON: f32 = 1e-6;

/// A value that approaches its target with a one-pole exponential curve.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    /// Per-sample coefficient (1.0 = instant)
    coeff: f32,
    sample_rate: f32,
    time_constant_s: f32,
}

impl SmoothedParam {
    /// Create a parameter that jumps straight to each new target.
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate: 48000.0,
            time_constant_s: 0.0,
        }
    }

    /// Create a parameter with a sample rate and time constant in seconds.
    pub fn with_time_constant(initial: f32, sample_rate: f32, time_constant_s: f32) -> Self {
        let mut param = Self::new(initial);
        param.sample_rate = sample_rate;
        param.time_constant_s = time_constant_s;
        param.recalculate_coeff();
        param
    }

    /// Start approaching `target` with the given time constant.
    ///
    /// The approach starts from wherever the value currently is, so a ramp
    /// issued mid-flight continues smoothly.
    pub fn ramp_to(&mut self, target: f32, time_constant_s: f32) {
        self.target = target;
        if time_constant_s != self.time_constant_s {
            self.time_constant_s = time_constant_s;
            self.recalculate_coeff();
        }
    }

    /// Change the target, keeping the current time constant.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Set target and current value at once.
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.current = value;
    }

    /// Update the sample rate, keeping the time constant in seconds.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coeff();
    }

    /// Advance one sample and return the new value.
    ///
    /// Lands exactly on the target once the step can no longer move the
    /// value in `f32`, or the remaining distance is below the settle
    /// threshold.
    #[inline]
    #[allow(clippy::float_cmp)]
    pub fn advance(&mut self) -> f32 {
        let next = self.current + self.coeff * (self.target - self.current);
        self.current = if next == self.current || (self.target - next).abs() < SETTLE_EPSILON {
            self.target
        } else {
            next
        };
        self.current
    }

    /// Current value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Value being approached.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Time constant in seconds of the active approach.
    #[inline]
    pub fn time_constant(&self) -> f32 {
        self.time_constant_s
    }

    /// True once the value is within 1e-6 of the target.
    #[inline]
    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() < SETTLE_EPSILON
    }

    /// Jump to the target.
    #[inline]
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }

    /// `coeff = 1 - exp(-1 / (tau * fs))`; zero tau means instant.
    fn recalculate_coeff(&mut self) {
        if self.time_constant_s <= 0.0 || self.sample_rate <= 0.0 {
            self.coeff = 1.0;
        } else {
            let samples = self.time_constant_s * self.sample_rate;
            self.coeff = 1.0 - expf(-1.0 / samples);
        }
    }
}

impl Default for SmoothedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}
