//! Stateless oscillators.
//!
//! Every oscillator is a pure function of `(t, freq, phase)`:
//! - `t`     : time in seconds
//! - `freq`  : frequency in Hz
//! - `phase` : offset added to `freq * t` (radians for `sine`, cycles otherwise)
//!
//! They carry no state between calls, so a script can evaluate any point in time
//! in any order. Generic over [`num_traits::Float`]; the engine uses `f64`.

use num_traits::{Float, FloatConst};

use crate::dsp::unit_phase;

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Sawtooth,
    Square,
    Triangle,
}

impl Waveform {
    /// Evaluate this waveform at `t`.
    #[inline]
    pub fn eval<T: Float + FloatConst>(self, t: T, freq: T, phase: T) -> T {
        match self {
            Waveform::Sine => sine(t, freq, phase),
            Waveform::Sawtooth => sawtooth(t, freq, phase),
            Waveform::Square => square(t, freq, phase),
            Waveform::Triangle => triangle(t, freq, phase),
        }
    }
}

/// `sin(2π f t + φ)`.
#[inline]
pub fn sine<T: Float + FloatConst>(t: T, freq: T, phase: T) -> T {
    (T::TAU() * freq * t + phase).sin()
}

/// `2·(f t + φ − floor(0.5 + f t + φ))`, range [-1, 1), period `1/f`.
#[inline]
pub fn sawtooth<T: Float>(t: T, freq: T, phase: T) -> T {
    let x = freq * t + phase;
    let half = T::one() / two();
    two::<T>() * (x - (half + x).floor())
}

/// `+1` for the first half of each cycle, `-1` for the second.
#[inline]
pub fn square<T: Float>(t: T, freq: T, phase: T) -> T {
    let half = T::one() / two();
    if unit_phase(freq * t + phase) < half { T::one() } else { -T::one() }
}

/// `1 − 4·|round(x − ¼) − (x − ¼)|` with `x = (f t + φ) mod 1`.
///
/// Peaks at `x = ¼` (+1) and `x = ¾` (−1), zero at the cycle start.
#[inline]
pub fn triangle<T: Float>(t: T, freq: T, phase: T) -> T {
    let four = two::<T>() * two();
    let quarter = T::one() / four;
    let y = unit_phase(freq * t + phase) - quarter;
    T::one() - four * (y.round() - y).abs()
}

#[inline]
fn two<T: Float>() -> T {
    T::one() + T::one()
}
