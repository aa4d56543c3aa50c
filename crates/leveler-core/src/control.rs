//! Front-panel control state.
//!
//! [`ControlState`] is the single source of truth for what the user has
//! asked for. Partial changes arrive as a [`ControlUpdate`]; applying one
//! clamps every knob to its range and reports which kinds of change
//! happened, so the engine knows whether to retarget parameters or rebuild
//! the graph.

use core::fmt;
use core::ops::RangeInclusive;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Peak reduction knob range.
pub const PEAK_REDUCTION_RANGE: RangeInclusive<f32> = 0.0..=100.0;
/// Makeup gain knob range.
pub const MAKEUP_GAIN_RANGE: RangeInclusive<f32> = 0.0..=100.0;
/// Threshold range in dB.
pub const THRESHOLD_RANGE_DB: RangeInclusive<f32> = -60.0..=0.0;

/// Where the signal comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SourceKind {
    /// Built-in modulated test tone.
    #[default]
    Tone,
    /// Live capture device.
    Live,
    /// Looped playback of the last recording.
    Sample,
}

impl SourceKind {
    /// All variants, in panel order.
    pub const ALL: [SourceKind; 3] = [SourceKind::Tone, SourceKind::Live, SourceKind::Sample];

    /// Lowercase name used on the command line and in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Tone => "tone",
            SourceKind::Live => "live",
            SourceKind::Sample => "sample",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no [`SourceKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSource;

impl fmt::Display for UnknownSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown source (expected tone, live or sample)")
    }
}

impl core::error::Error for UnknownSource {}

impl FromStr for SourceKind {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let names = |aliases: &[&str]| aliases.iter().any(|a| a.eq_ignore_ascii_case(s));
        if names(&["tone", "osc", "oscillator"]) {
            Ok(SourceKind::Tone)
        } else if names(&["live", "mic", "input"]) {
            Ok(SourceKind::Live)
        } else if names(&["sample", "recording"]) {
            Ok(SourceKind::Sample)
        } else {
            Err(UnknownSource)
        }
    }
}

/// Everything the user can set on the front panel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControlState {
    /// Peak reduction knob, 0 to 100.
    pub peak_reduction: f32,
    /// Makeup gain knob, 0 to 100.
    pub makeup_gain: f32,
    /// Compression threshold in dB, -60 to 0.
    pub threshold_db: f32,
    /// Whether the signal chain exists at all.
    pub power: bool,
    /// Route the dry signal to the output instead of the processed one.
    pub bypass: bool,
    /// Selected source.
    pub source: SourceKind,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            peak_reduction: 30.0,
            makeup_gain: 50.0,
            threshold_db: -30.0,
            power: false,
            bypass: false,
            source: SourceKind::Tone,
        }
    }
}

/// A partial change to [`ControlState`]. `None` fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlUpdate {
    /// New peak reduction.
    pub peak_reduction: Option<f32>,
    /// New makeup gain.
    pub makeup_gain: Option<f32>,
    /// New threshold in dB.
    pub threshold_db: Option<f32>,
    /// New power state.
    pub power: Option<bool>,
    /// New bypass state.
    pub bypass: Option<bool>,
    /// New source.
    pub source: Option<SourceKind>,
}

impl ControlUpdate {
    /// Update only the peak reduction knob.
    pub fn peak_reduction(value: f32) -> Self {
        Self {
            peak_reduction: Some(value),
            ..Self::default()
        }
    }

    /// Update only the makeup gain knob.
    pub fn makeup_gain(value: f32) -> Self {
        Self {
            makeup_gain: Some(value),
            ..Self::default()
        }
    }

    /// Update only the threshold.
    pub fn threshold_db(value: f32) -> Self {
        Self {
            threshold_db: Some(value),
            ..Self::default()
        }
    }

    /// Update only the power switch.
    pub fn power(on: bool) -> Self {
        Self {
            power: Some(on),
            ..Self::default()
        }
    }

    /// Update only bypass.
    pub fn bypass(on: bool) -> Self {
        Self {
            bypass: Some(on),
            ..Self::default()
        }
    }

    /// Update only the source.
    pub fn source(kind: SourceKind) -> Self {
        Self {
            source: Some(kind),
            ..Self::default()
        }
    }

    /// True if nothing is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Which kinds of change an applied update produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlChanges {
    /// A knob value changed; parameters need retargeting.
    pub knobs: bool,
    /// Bypass flipped; wet/dry need retargeting.
    pub bypass: bool,
    /// Power flipped; the graph must be built or torn down.
    pub power: bool,
    /// Source changed; the graph must be rebuilt if powered.
    pub source: bool,
}

impl ControlChanges {
    /// True if anything changed.
    pub fn any(&self) -> bool {
        self.knobs || self.bypass || self.power || self.source
    }
}

fn clamp_knob(value: f32, range: &RangeInclusive<f32>) -> Option<f32> {
    if value.is_finite() {
        Some(value.clamp(*range.start(), *range.end()))
    } else {
        None
    }
}

fn set_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

impl ControlState {
    /// Merge `update` into the state.
    ///
    /// Knob values are clamped to their ranges and non-finite values are
    /// dropped. Fields equal to the current value do not count as changes.
    pub fn apply(&mut self, update: &ControlUpdate) -> ControlChanges {
        let mut changes = ControlChanges::default();

        if let Some(v) = update.peak_reduction.and_then(|v| clamp_knob(v, &PEAK_REDUCTION_RANGE)) {
            changes.knobs |= set_if_changed(&mut self.peak_reduction, v);
        }
        if let Some(v) = update.makeup_gain.and_then(|v| clamp_knob(v, &MAKEUP_GAIN_RANGE)) {
            changes.knobs |= set_if_changed(&mut self.makeup_gain, v);
        }
        if let Some(v) = update.threshold_db.and_then(|v| clamp_knob(v, &THRESHOLD_RANGE_DB)) {
            changes.knobs |= set_if_changed(&mut self.threshold_db, v);
        }
        if let Some(on) = update.bypass {
            changes.bypass = set_if_changed(&mut self.bypass, on);
        }
        if let Some(on) = update.power {
            changes.power = set_if_changed(&mut self.power, on);
        }
        if let Some(kind) = update.source {
            changes.source = set_if_changed(&mut self.source, kind);
        }

        #[cfg(feature = "tracing")]
        if changes.any() {
            tracing::trace!(?changes, "control state updated");
        }

        changes
    }
}
