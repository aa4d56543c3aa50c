//! Fixed-characteristic leveling compressor.
//!
//! A feed-forward compressor whose only live parameter is the threshold. The
//! ratio, knee, attack and release come from [`DynamicsSettings`] and stay put
//! for the lifetime of the graph, like the fixed time constants of an optical
//! cell.
//!
//! # Signal Flow
//!
//! ```text
//! Input → Peak Detector → Gain Computer → Ballistics (dB) → Gain → Output
//! ```
//!
//! Ballistics run on the gain reduction itself: the reduction deepens with
//! the attack time constant and recovers with the release time constant.
//! With [`ReleaseModel::TwoStage`] recovery is split into a fast part and a
//! slow part that each carry half of the reduction.

use leveler_core::{Effect, SmoothedParam, db_to_linear, flush_denormal, linear_to_db};
use libm::expf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Recovery time constant of the peak detector.
const DETECTOR_RELEASE_S: f32 = 0.01;
/// Fast stage of the two-stage release.
const FAST_RELEASE_S: f32 = 0.08;
/// Slow stage of the two-stage release.
const SLOW_RELEASE_S: f32 = 1.5;

/// How gain reduction recovers once the signal falls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReleaseModel {
    /// One release time constant (`release_ms`).
    #[default]
    SingleStage,
    /// Half the reduction recovers in about 80 ms, the rest over about 1.5 s.
    TwoStage,
}

/// Fixed characteristics of the dynamics processor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DynamicsSettings {
    /// Compression ratio (12 means 12:1).
    pub ratio: f32,
    /// Knee width in dB. Zero is a hard knee.
    pub knee_db: f32,
    /// Attack time constant in milliseconds.
    pub attack_ms: f32,
    /// Release time constant in milliseconds (single stage).
    pub release_ms: f32,
    /// Release behaviour.
    pub release: ReleaseModel,
}

impl Default for DynamicsSettings {
    fn default() -> Self {
        Self {
            ratio: 12.0,
            knee_db: 0.0,
            attack_ms: 5.0,
            release_ms: 250.0,
            release: ReleaseModel::SingleStage,
        }
    }
}

fn one_pole_coeff(time_constant_s: f32, sample_rate: f32) -> f32 {
    if time_constant_s <= 0.0 || sample_rate <= 0.0 {
        1.0
    } else {
        1.0 - expf(-1.0 / (time_constant_s * sample_rate))
    }
}

/// Static curve: reduction in dB (positive) for a level in dB.
#[derive(Debug, Clone, Copy)]
struct GainComputer {
    ratio: f32,
    knee_db: f32,
}

impl GainComputer {
    #[inline]
    fn reduction_db(&self, level_db: f32, threshold_db: f32) -> f32 {
        let overshoot = level_db - threshold_db;
        let slope = 1.0 - 1.0 / self.ratio;
        let half_knee = self.knee_db / 2.0;

        if overshoot <= -half_knee {
            0.0
        } else if overshoot > half_knee {
            overshoot * slope
        } else {
            let x = overshoot + half_knee;
            slope * x * x / (2.0 * self.knee_db)
        }
    }
}

/// One attack/release smoother over a share of the reduction.
#[derive(Debug, Clone, Copy)]
struct Ballistics {
    share: f32,
    release_s: f32,
    release_coeff: f32,
    value_db: f32,
}

impl Ballistics {
    fn new(share: f32, release_s: f32, sample_rate: f32) -> Self {
        Self {
            share,
            release_s,
            release_coeff: one_pole_coeff(release_s, sample_rate),
            value_db: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, target_db: f32, attack_coeff: f32) -> f32 {
        let target = target_db * self.share;
        let coeff = if target > self.value_db {
            attack_coeff
        } else {
            self.release_coeff
        };
        self.value_db = flush_denormal(self.value_db + coeff * (target - self.value_db));
        self.value_db
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.release_coeff = one_pole_coeff(self.release_s, sample_rate);
    }
}

/// The dynamics node of the leveler.
///
/// ```rust
/// use leveler_core::Effect;
/// use leveler_effects::{DynamicsSettings, LevelingCompressor};
///
/// let mut comp = LevelingCompressor::new(48000.0, DynamicsSettings::default(), -30.0);
/// for _ in 0..4800 {
///     comp.process(0.9);
/// }
/// assert!(comp.gain_reduction_db() < -20.0);
/// ```
#[derive(Debug, Clone)]
pub struct LevelingCompressor {
    settings: DynamicsSettings,
    computer: GainComputer,
    threshold: SmoothedParam,
    detector: f32,
    detector_coeff: f32,
    attack_coeff: f32,
    stages: [Ballistics; 2],
    stage_count: usize,
    sample_rate: f32,
    /// Last applied reduction in dB (never positive).
    last_gain_reduction_db: f32,
}

impl LevelingCompressor {
    /// Create a compressor with the given characteristics and threshold.
    pub fn new(sample_rate: f32, settings: DynamicsSettings, threshold_db: f32) -> Self {
        let ratio = settings.ratio.max(1.0);
        let knee_db = settings.knee_db.max(0.0);
        let (stages, stage_count) = match settings.release {
            ReleaseModel::SingleStage => (
                [
                    Ballistics::new(1.0, settings.release_ms / 1000.0, sample_rate),
                    Ballistics::new(0.0, settings.release_ms / 1000.0, sample_rate),
                ],
                1,
            ),
            ReleaseModel::TwoStage => (
                [
                    Ballistics::new(0.5, FAST_RELEASE_S, sample_rate),
                    Ballistics::new(0.5, SLOW_RELEASE_S, sample_rate),
                ],
                2,
            ),
        };

        Self {
            settings,
            computer: GainComputer { ratio, knee_db },
            threshold: SmoothedParam::with_time_constant(threshold_db, sample_rate, 0.0),
            detector: 0.0,
            detector_coeff: one_pole_coeff(DETECTOR_RELEASE_S, sample_rate),
            attack_coeff: one_pole_coeff(settings.attack_ms / 1000.0, sample_rate),
            stages,
            stage_count,
            sample_rate,
            last_gain_reduction_db: 0.0,
        }
    }

    /// Approach a new threshold with the given time constant in seconds.
    pub fn set_threshold_db(&mut self, threshold_db: f32, time_constant_s: f32) {
        self.threshold.ramp_to(threshold_db, time_constant_s);
    }

    /// Threshold currently in effect (smoothed).
    pub fn threshold_db(&self) -> f32 {
        self.threshold.get()
    }

    /// Fixed characteristics.
    pub fn settings(&self) -> &DynamicsSettings {
        &self.settings
    }

    /// Reduction applied to the last sample, in dB.
    ///
    /// Zero means no compression; -6.0 means the signal is 6 dB quieter.
    pub fn gain_reduction_db(&self) -> f32 {
        self.last_gain_reduction_db
    }
}

impl Effect for LevelingCompressor {
    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let level = input.abs();
        self.detector = if level > self.detector {
            level
        } else {
            flush_denormal(self.detector + self.detector_coeff * (level - self.detector))
        };

        let threshold_db = self.threshold.advance();
        let target_db = self
            .computer
            .reduction_db(linear_to_db(self.detector), threshold_db);

        let attack = self.attack_coeff;
        let reduction_db: f32 = self.stages[..self.stage_count]
            .iter_mut()
            .map(|stage| stage.process(target_db, attack))
            .sum();

        self.last_gain_reduction_db = -reduction_db.max(0.0);
        input * db_to_linear(self.last_gain_reduction_db)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.threshold.set_sample_rate(sample_rate);
        self.detector_coeff = one_pole_coeff(DETECTOR_RELEASE_S, sample_rate);
        self.attack_coeff = one_pole_coeff(self.settings.attack_ms / 1000.0, sample_rate);
        for stage in &mut self.stages {
            stage.set_sample_rate(sample_rate);
        }
    }

    fn reset(&mut self) {
        self.detector = 0.0;
        for stage in &mut self.stages {
            stage.value_db = 0.0;
        }
        self.threshold.snap_to_target();
        self.last_gain_reduction_db = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn run(comp: &mut LevelingCompressor, amplitude: f32, samples: usize) {
        for i in 0..samples {
            // 200 Hz sine
            let x = amplitude * libm::sinf(i as f32 * core::f32::consts::TAU * 200.0 / SR);
            comp.process(x);
        }
    }

    #[test]
    fn quiet_signal_is_untouched() {
        let mut comp = LevelingCompressor::new(SR, DynamicsSettings::default(), -30.0);
        run(&mut comp, 0.001, 4800);
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }

    #[test]
    fn hard_knee_ratio_twelve_reduction() {
        let mut comp = LevelingCompressor::new(SR, DynamicsSettings::default(), -30.0);
        // 0 dBFS peaks, 30 dB over threshold: 30 * (11/12) = 27.5 dB
        run(&mut comp, 1.0, 24000);
        let gr = comp.gain_reduction_db();
        assert!((gr + 27.5).abs() < 1.0, "gain reduction {gr}");
    }

    #[test]
    fn gain_reduction_is_never_positive() {
        let mut comp = LevelingCompressor::new(SR, DynamicsSettings::default(), -60.0);
        for i in 0..10000 {
            let x = if i % 3 == 0 { 1.0 } else { -0.2 };
            comp.process(x);
            assert!(comp.gain_reduction_db() <= 0.0);
        }
    }

    #[test]
    fn lower_threshold_means_more_reduction() {
        let mut high = LevelingCompressor::new(SR, DynamicsSettings::default(), -10.0);
        let mut low = LevelingCompressor::new(SR, DynamicsSettings::default(), -40.0);
        run(&mut high, 0.5, 9600);
        run(&mut low, 0.5, 9600);
        assert!(low.gain_reduction_db() < high.gain_reduction_db());
    }

    #[test]
    fn threshold_change_is_smoothed() {
        let mut comp = LevelingCompressor::new(SR, DynamicsSettings::default(), -30.0);
        comp.set_threshold_db(0.0, 0.1);
        comp.process(0.0);
        assert!(comp.threshold_db() < -29.0);
        for _ in 0..48000 {
            comp.process(0.0);
        }
        assert!(comp.threshold_db() > -0.01);
    }

    #[test]
    fn release_recovers_after_signal_stops() {
        let mut comp = LevelingCompressor::new(SR, DynamicsSettings::default(), -30.0);
        run(&mut comp, 1.0, 9600);
        let engaged = comp.gain_reduction_db();
        // One release time constant of silence: about 63% recovered
        for _ in 0..12000 {
            comp.process(0.0);
        }
        let recovered = comp.gain_reduction_db();
        assert!(recovered > engaged * 0.5, "{engaged} -> {recovered}");
        assert!(recovered < 0.0);
    }

    #[test]
    fn two_stage_release_recovers_fast_then_slow() {
        let settings = DynamicsSettings {
            release: ReleaseModel::TwoStage,
            ..DynamicsSettings::default()
        };
        let mut two = LevelingCompressor::new(SR, settings, -30.0);
        let mut one = LevelingCompressor::new(SR, DynamicsSettings::default(), -30.0);
        run(&mut two, 1.0, 24000);
        run(&mut one, 1.0, 24000);
        let engaged = two.gain_reduction_db();

        // 300 ms of silence: the fast half is gone, the slow half mostly remains
        for _ in 0..14400 {
            two.process(0.0);
            one.process(0.0);
        }
        let after = two.gain_reduction_db();
        assert!(after > engaged * 0.5 && after < engaged * 0.3, "{engaged} -> {after}");

        // Two seconds later the single-stage release has finished, the slow
        // stage still holds some reduction
        for _ in 0..96000 {
            two.process(0.0);
            one.process(0.0);
        }
        assert!(two.gain_reduction_db() < one.gain_reduction_db());
    }

    #[test]
    fn reset_clears_reduction() {
        let mut comp = LevelingCompressor::new(SR, DynamicsSettings::default(), -30.0);
        run(&mut comp, 1.0, 4800);
        comp.reset();
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }
}
