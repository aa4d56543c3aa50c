//! Property-based tests for the compressor and the test tone.

use leveler_core::Effect;
use leveler_effects::{
    DynamicsSettings, LevelingCompressor, ModulatedTone, ReleaseModel, ToneSettings,
};
use proptest::prelude::*;

fn release_model() -> impl Strategy<Value = ReleaseModel> {
    prop_oneof![Just(ReleaseModel::SingleStage), Just(ReleaseModel::TwoStage)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Gain reduction is never positive and the output never grows past the
    /// input, whatever the signal and threshold.
    #[test]
    fn compressor_only_attenuates(
        input in prop::collection::vec(-4.0f32..4.0, 1..2048),
        threshold in -60.0f32..0.0,
        ratio in 1.0f32..30.0,
        release in release_model(),
    ) {
        let settings = DynamicsSettings { ratio, release, ..DynamicsSettings::default() };
        let mut comp = LevelingCompressor::new(48000.0, settings, threshold);
        for &x in &input {
            let y = comp.process(x);
            prop_assert!(y.is_finite());
            prop_assert!(y.abs() <= x.abs() + 1e-6, "{y} louder than {x}");
            prop_assert!(comp.gain_reduction_db() <= 0.0);
        }
    }

    /// Moving the threshold mid-stream keeps the output bounded.
    #[test]
    fn threshold_ramps_stay_bounded(
        from in -60.0f32..0.0,
        to in -60.0f32..0.0,
        tc in 0.0f32..0.5,
        level in 0.0f32..2.0,
    ) {
        let mut comp = LevelingCompressor::new(48000.0, DynamicsSettings::default(), from);
        for _ in 0..256 {
            comp.process(level);
        }
        comp.set_threshold_db(to, tc);
        for _ in 0..4800 {
            let y = comp.process(level);
            prop_assert!(y.is_finite() && y.abs() <= level + 1e-6);
        }
        let t = comp.threshold_db();
        prop_assert!(t >= from.min(to) - 1e-3 && t <= from.max(to) + 1e-3);
    }

    /// A running tone never exceeds its advertised peak.
    #[test]
    fn tone_respects_its_peak(
        frequency_hz in 20.0f32..2000.0,
        lfo_hz in 0.1f32..10.0,
        level in 0.0f32..1.0,
        depth in 0.0f32..1.0,
    ) {
        let settings = ToneSettings { frequency_hz, lfo_hz, level, depth };
        let mut tone = ModulatedTone::new(48000.0, settings);
        tone.start();
        for _ in 0..4800 {
            let s = tone.next_sample();
            prop_assert!(s.is_finite());
            prop_assert!(s.abs() <= settings.peak() + 1e-4);
        }
    }
}
