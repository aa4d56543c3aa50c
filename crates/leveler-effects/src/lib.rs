//! Leveler Effects - the processing nodes behind the leveling amplifier
//!
//! - [`LevelingCompressor`] - fixed ratio/knee/attack/release dynamics with a
//!   smoothed threshold and a readable gain reduction
//! - [`ModulatedTone`] - sine carrier with slow amplitude modulation, used as
//!   the built-in test source
//!
//! Both run sample by sample with no allocation and implement or build on
//! the [`leveler_core::Effect`] conventions.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod compressor;
pub mod tone;

pub use compressor::{DynamicsSettings, LevelingCompressor, ReleaseModel};
pub use tone::{ModulatedTone, ToneSettings};
