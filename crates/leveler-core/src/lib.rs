//! Leveler Core - control state, parameter mapping and DSP primitives
//!
//! The pieces of the leveling amplifier that do not depend on an audio
//! runtime: what the user asked for, how that becomes processing
//! parameters, and the small smoothing and oscillator building blocks the
//! processing nodes are made of.
//!
//! # Controls
//!
//! - [`ControlState`] / [`ControlUpdate`] - front-panel state and partial updates
//! - [`SourceKind`] - tone, live input or recorded sample
//!
//! # Mapping
//!
//! - [`MappedParams`] - drive, threshold, makeup and wet/dry targets
//! - [`Control`] - one writable parameter and its smoothing time constant
//!
//! # Primitives
//!
//! - [`SmoothedParam`] - exponential approach toward a target
//! - [`GainStage`] - smoothed linear gain as an [`Effect`]
//! - [`SineOscillator`] - phase-accumulating sine
//! - [`rms_to_db`] - meter reading for a window of samples
//!
//! # no_std Support
//!
//! Disable the default `std` feature to use this crate without the standard
//! library. Math goes through `libm`.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod control;
pub mod effect;
pub mod mapping;
pub mod math;
pub mod oscillator;
pub mod param;

pub use control::{
    ControlChanges, ControlState, ControlUpdate, MAKEUP_GAIN_RANGE, PEAK_REDUCTION_RANGE,
    SourceKind, THRESHOLD_RANGE_DB, UnknownSource,
};
pub use effect::{Effect, GainStage};
pub use mapping::{
    Control, MIX_TIME_CONSTANT_S, MappedParams, PARAM_TIME_CONSTANT_S, drive_for_peak_reduction,
    makeup_for_gain, mix_weights,
};
pub use math::{
    METER_EPSILON, METER_FLOOR_DB, db_to_linear, flush_denormal, linear_to_db, rms, rms_to_db,
};
pub use oscillator::SineOscillator;
pub use param::SmoothedParam;
