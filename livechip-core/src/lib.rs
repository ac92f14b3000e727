#![cfg_attr(not(feature = "std"), no_std)]
//! livechip core: signal primitives shared by the engine and the script host.
//!
//! Features
//! - `std`    : (default) use the Rust standard library
//! - `no-std` : build with `#![no_std]`; float intrinsics come from `libm`
//!
//! Modules
//! - [`osc`] : deterministic oscillators of `(time, frequency, phase)`
//! - [`dsp`] : sample conditioning (clamp, volume) and phase helpers
//!
//! Everything here is stateless and allocation free; the random family lives in
//! the engine because it needs a seeded generator.

pub mod dsp;
pub mod osc;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{clamp_unit, condition, sanitize_volume, unit_phase};
    pub use crate::osc::{sawtooth, sine, square, triangle, Waveform};
}
