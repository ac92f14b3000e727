//! livechip engine: a real-time audio engine driven by a hot-swappable script.
//!
//! Crate layout:
//! - [`ring`]     : lock-free SPSC ring buffer of `f32` samples
//! - [`state`]    : shared render state (time cursor, volume, script slot, stats)
//! - [`script`]   : the `SampleScript` seam, the script slot, and the Lua host
//! - [`producer`] : background thread that evaluates the script into the ring
//! - [`consumer`] : the audio callback body that drains the ring
//! - [`backend`]  : the audio backend seam and its cpal implementation
//! - [`engine`]   : lifecycle state machine tying it all together
//! - [`config`], [`error`], [`noise`] : settings, error types, random family
//!
//! Features
//! - `realtime` : (default) audio output through cpal
//! - `lua`      : (default) Lua 5.4 scripts via mlua
//!
//! The audio callback never locks, allocates, logs, or calls into a script. All
//! script evaluation happens ahead of time on the producer thread.

pub mod backend;
pub mod config;
pub mod consumer;
pub mod engine;
pub mod error;
pub mod noise;
pub mod producer;
pub mod ring;
pub mod script;
pub mod state;

pub use backend::{AudioBackend, OutputStream, StreamSpec};
pub use config::EngineConfig;
pub use consumer::RenderConsumer;
pub use engine::{Engine, EngineState};
pub use error::{EngineError, EngineResult, ScriptError, ScriptResult};
pub use noise::SignalRng;
pub use ring::RingBuffer;
pub use script::{script_fn, SampleScript, ScriptHandle, ScriptMeta};
pub use state::{RenderState, StatsSnapshot};

#[cfg(feature = "realtime")]
pub use backend::{list_output_devices, CpalBackend};
#[cfg(feature = "lua")]
pub use script::lua::{LuaScript, LuaScriptHost};

/// The engine wired to the default cpal backend.
#[cfg(feature = "realtime")]
pub type RealtimeEngine = Engine<CpalBackend>;
