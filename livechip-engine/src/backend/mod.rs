//! Audio backend seam.
//!
//! The engine needs exactly four things from an audio backend: open a mono f32
//! stream that calls a [`RenderConsumer`] once per block, play it, pause it, and
//! close it (drop). The cpal implementation is compiled with the `realtime`
//! feature; tests drive the engine through a recording backend instead.

use crate::config::EngineConfig;
use crate::consumer::RenderConsumer;
use crate::error::EngineResult;

cfg_if::cfg_if! {
    if #[cfg(feature = "realtime")] {
        mod cpal_backend;
        pub use self::cpal_backend::{list_output_devices, CpalBackend, CpalStream};
    }
}

/// What the engine asks the backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub device: Option<String>,
}

impl From<&EngineConfig> for StreamSpec {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            sample_rate: cfg.sample_rate,
            frame_size: cfg.frame_size,
            device: cfg.device.clone(),
        }
    }
}

/// An open output stream. Dropping it closes the stream.
pub trait OutputStream {
    fn play(&self) -> EngineResult<()>;
    fn pause(&self) -> EngineResult<()>;
}

pub trait AudioBackend {
    type Stream: OutputStream;

    /// Select a device and open a paused stream that pulls from `consumer`.
    fn open(&mut self, spec: &StreamSpec, consumer: RenderConsumer) -> EngineResult<Self::Stream>;
}
