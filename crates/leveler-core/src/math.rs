//! Level conversions and metering math.

use libm::{expf, log10f, logf, sqrtf};

/// Offset added to an RMS value before converting to dB for meters, so
/// silence reads as -80 dB rather than negative infinity.
pub const METER_EPSILON: f32 = 1e-4;

/// Lowest reading a meter should ever display.
pub const METER_FLOOR_DB: f32 = -60.0;

/// Convert decibels to linear gain.
///
/// ```rust
/// use leveler_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels. Inputs at or below zero clamp to -200 dB.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Root mean square of a window. Empty windows are silent.
pub fn rms(window: &[f32]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let sum: f32 = window.iter().map(|s| s * s).sum();
    sqrtf(sum / window.len() as f32)
}

/// Meter reading for a window: `20 * log10(rms + 1e-4)`.
///
/// ```rust
/// use leveler_core::rms_to_db;
///
/// assert!((rms_to_db(&[0.0; 128]) + 80.0).abs() < 0.01);
/// ```
pub fn rms_to_db(window: &[f32]) -> f32 {
    20.0 * log10f(rms(window) + METER_EPSILON)
}

/// Flush values too small to matter to zero.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}
