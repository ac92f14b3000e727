//! Error types for engine setup and script evaluation.
//!
//! [`EngineError`] covers the fatal setup path (config, device, stream, producer
//! thread). [`ScriptError`] covers everything a script can do wrong; the
//! producer turns it into silence and never propagates it.

use std::io;

use thiserror::Error;

use crate::engine::EngineState;

/// Errors produced by the engine control surface.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The host reports no output-capable device.
    #[error("no usable output device")]
    NoOutputDevice,

    /// A device was requested by name but is not present.
    #[error("output device not found: {0}")]
    DeviceNotFound(String),

    /// Enumerating or querying devices failed.
    #[error("device query failed: {0}")]
    DeviceQuery(String),

    /// The sample ring could not be allocated.
    #[error("cannot allocate a ring of {samples} samples: {reason}")]
    Alloc { samples: usize, reason: String },

    /// Building the output stream failed.
    #[error("failed to open output stream: {0}")]
    OpenStream(String),

    /// Starting or pausing the stream failed.
    #[error("stream control failed: {0}")]
    PlayStream(String),

    /// The producer thread could not be spawned.
    #[error("failed to spawn producer thread: {0}")]
    SpawnProducer(#[source] io::Error),

    /// Operation not allowed in the current lifecycle state.
    #[error("cannot {op} while {state:?}")]
    InvalidState {
        op: &'static str,
        state: EngineState,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while loading or evaluating a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[cfg(feature = "lua")]
    #[error("lua error: {0}")]
    Lua(#[from] mlua::Error),

    /// The chunk did not provide the entry function.
    #[error("script must return a function (got {0})")]
    MissingEntry(String),

    /// The entry function returned something that is not a number.
    #[error("script returned a non-numeric value ({0})")]
    NotNumeric(&'static str),

    /// The entry function returned NaN or an infinity.
    #[error("script returned a non-finite value ({0})")]
    NonFinite(f64),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other failure reported by a native script.
    #[error("script failed: {0}")]
    Failed(String),
}

pub type ScriptResult<T> = Result<T, ScriptError>;
