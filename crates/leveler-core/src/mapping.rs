//! Knob-to-parameter mapping.
//!
//! | Knob | Parameter | Formula | Time constant |
//! |------|-----------|---------|---------------|
//! | peak reduction | input drive (linear) | `max(0, pr / 10)` | 100 ms |
//! | threshold | processor threshold (dB) | 1:1 | 100 ms |
//! | makeup gain | output gain (linear) | `gain / 40` | 100 ms |
//! | bypass | wet / dry weights | `(1, 0)` or `(0, 1)` | 50 ms |
//!
//! Peak reduction drives the signal harder into a fixed threshold, the way
//! the hardware's front-panel control does, rather than moving the
//! threshold itself.

use crate::control::ControlState;

/// Time constant for drive, threshold and makeup writes.
pub const PARAM_TIME_CONSTANT_S: f32 = 0.1;
/// Time constant for wet/dry crossfades.
pub const MIX_TIME_CONSTANT_S: f32 = 0.05;

/// Linear input drive for a peak reduction setting.
///
/// ```rust
/// use leveler_core::drive_for_peak_reduction;
///
/// assert_eq!(drive_for_peak_reduction(30.0), 3.0);
/// assert_eq!(drive_for_peak_reduction(-5.0), 0.0);
/// ```
#[inline]
pub fn drive_for_peak_reduction(peak_reduction: f32) -> f32 {
    (peak_reduction / 10.0).max(0.0)
}

/// Linear output gain for a makeup gain setting.
#[inline]
pub fn makeup_for_gain(makeup_gain: f32) -> f32 {
    makeup_gain / 40.0
}

/// Wet and dry weights for a bypass setting.
#[inline]
pub fn mix_weights(bypass: bool) -> (f32, f32) {
    if bypass { (0.0, 1.0) } else { (1.0, 0.0) }
}

/// A parameter the mapper writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Input drive ahead of the processor.
    Drive,
    /// Processor threshold.
    Threshold,
    /// Output gain after the processor.
    Makeup,
    /// Weight of the processed path.
    Wet,
    /// Weight of the unprocessed path.
    Dry,
}

impl Control {
    /// Every control, in write order.
    pub const ALL: [Control; 5] = [
        Control::Drive,
        Control::Threshold,
        Control::Makeup,
        Control::Wet,
        Control::Dry,
    ];

    /// Smoothing time constant used when writing this control.
    pub fn time_constant(self) -> f32 {
        match self {
            Control::Wet | Control::Dry => MIX_TIME_CONSTANT_S,
            Control::Drive | Control::Threshold | Control::Makeup => PARAM_TIME_CONSTANT_S,
        }
    }
}

/// Processing parameters derived from a [`ControlState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappedParams {
    /// Input drive, 0 to 10.
    pub drive: f32,
    /// Threshold in dB.
    pub threshold_db: f32,
    /// Makeup gain, 0 to 2.5.
    pub makeup: f32,
    /// Processed path weight.
    pub wet: f32,
    /// Dry path weight.
    pub dry: f32,
}

impl MappedParams {
    /// Map the current knob positions.
    pub fn from_state(state: &ControlState) -> Self {
        let (wet, dry) = mix_weights(state.bypass);
        Self {
            drive: drive_for_peak_reduction(state.peak_reduction),
            threshold_db: state.threshold_db,
            makeup: makeup_for_gain(state.makeup_gain),
            wet,
            dry,
        }
    }

    /// Target value for one control.
    pub fn get(&self, control: Control) -> f32 {
        match control {
            Control::Drive => self.drive,
            Control::Threshold => self.threshold_db,
            Control::Makeup => self.makeup,
            Control::Wet => self.wet,
            Control::Dry => self.dry,
        }
    }

    /// All targets with their time constants, in write order.
    pub fn targets(&self) -> [(Control, f32, f32); 5] {
        Control::ALL.map(|c| (c, self.get(c), c.time_constant()))
    }
}

impl Default for MappedParams {
    fn default() -> Self {
        Self::from_state(&ControlState::default())
    }
}
