//! Sample conditioning and phase helpers.
//!
//! Conventions:
//! - Script values arrive as `f64` in an unconstrained range.
//! - Rendered samples leave as `f32` in [-1, 1] after volume scaling.

use num_traits::Float;

/// Clamp to [-1, 1]. NaN maps to silence.
#[inline]
pub fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(-1.0, 1.0) }
}

/// Clamp a raw script value to [-1, 1] and scale it by `volume`.
#[inline]
pub fn condition(raw: f64, volume: f32) -> f32 {
    (clamp_unit(raw) * f64::from(volume)) as f32
}

/// Force a volume into [0, 1]; non-finite input becomes 0.
#[inline]
pub fn sanitize_volume(v: f32) -> f32 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}

/// Position within one cycle, `x mod 1` in [0, 1] (Euclidean remainder).
///
/// For non-negative `x` this is the same value as C's `fmod(x, 1.0)`.
#[inline]
pub fn unit_phase<T: Float>(x: T) -> T {
    let r = x % T::one();
    if r < T::zero() { r + T::one() } else { r }
}
