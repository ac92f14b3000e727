//! Engine lifecycle.
//!
//! ```text
//! Uninitialized --open--> DeviceReady --start--> Streaming --stop--> Stopped
//! ```
//!
//! - `open`  : allocate the ring, open the device stream (paused)
//! - `start` : optionally prime the ring, play the stream, spawn the producer
//! - `stop`  : join the producer, pause and close the stream, free the ring
//!
//! `stop` is valid from every state and idempotent; dropping the engine stops it.
//! `Stopped` ends the session: a new session needs a new `Engine`.

use std::sync::Arc;

use crate::backend::{AudioBackend, OutputStream, StreamSpec};
use crate::config::EngineConfig;
use crate::consumer::RenderConsumer;
use crate::error::{EngineError, EngineResult};
use crate::producer::{Producer, ProducerHandle};
use crate::ring::RingBuffer;
use crate::script::{ScriptHandle, ScriptMeta};
use crate::state::{RenderState, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    DeviceReady,
    Streaming,
    Stopped,
}

pub struct Engine<B: AudioBackend> {
    config: EngineConfig,
    backend: B,
    state: EngineState,
    render: Arc<RenderState>,
    ring: Option<Arc<RingBuffer>>,
    stream: Option<B::Stream>,
    producer: Option<ProducerHandle>,
    #[cfg(test)]
    fail_producer_spawn: bool,
}

impl<B: AudioBackend> Engine<B> {
    /// Validate `config` and create the session's render state.
    /// Nothing is allocated on the audio side until [`open`](Self::open).
    pub fn new(config: EngineConfig, backend: B) -> EngineResult<Self> {
        config.validate()?;
        let render = Arc::new(RenderState::new(config.sample_rate, config.frame_size, config.volume));
        Ok(Self {
            config,
            backend,
            state: EngineState::Uninitialized,
            render,
            ring: None,
            stream: None,
            producer: None,
            #[cfg(test)]
            fail_producer_spawn: false,
        })
    }

    /// `Uninitialized → DeviceReady`: allocate the ring and open the device.
    ///
    /// On failure nothing is kept and the engine stays `Uninitialized`.
    pub fn open(&mut self) -> EngineResult<()> {
        match self.state {
            EngineState::Uninitialized => {}
            EngineState::DeviceReady => return Ok(()),
            state => return Err(EngineError::InvalidState { op: "open", state }),
        }

        let ring = Arc::new(RingBuffer::new(self.config.capacity())?);
        let consumer = RenderConsumer::new(Arc::clone(&self.render), Arc::clone(&ring));
        let spec = StreamSpec::from(&self.config);
        let stream = self.backend.open(&spec, consumer).map_err(|e| {
            log::error!("failed to open output: {e}");
            e
        })?;

        self.ring = Some(ring);
        self.stream = Some(stream);
        self.state = EngineState::DeviceReady;
        log::info!(
            "engine ready: {} Hz, block {} frames, ring {} samples",
            self.config.sample_rate,
            self.config.frame_size,
            self.config.capacity()
        );
        Ok(())
    }

    /// `DeviceReady → Streaming` (opening first if needed).
    ///
    /// The stream is started before the producer thread; if the thread cannot be
    /// spawned the stream is paused again and the engine stays `DeviceReady`.
    pub fn start(&mut self) -> EngineResult<()> {
        match self.state {
            EngineState::Uninitialized => self.open()?,
            EngineState::DeviceReady => {}
            state => return Err(EngineError::InvalidState { op: "start", state }),
        }

        let (Some(ring), Some(stream)) = (self.ring.as_ref(), self.stream.as_ref()) else {
            return Err(EngineError::InvalidState { op: "start", state: self.state });
        };

        let mut producer = Producer::new(Arc::clone(&self.render), Arc::clone(ring));
        if self.config.prime_buffer {
            let blocks = producer.fill();
            log::debug!("primed {blocks} blocks before streaming");
        }

        stream.play()?;

        match self.spawn_producer(producer) {
            Ok(handle) => self.producer = Some(handle),
            Err(e) => {
                if let Err(pe) = stream.pause() {
                    log::warn!("could not pause stream after producer failure: {pe}");
                }
                log::error!("{e}");
                return Err(e);
            }
        }

        self.state = EngineState::Streaming;
        log::info!("streaming");
        Ok(())
    }

    fn spawn_producer(&self, producer: Producer) -> EngineResult<ProducerHandle> {
        #[cfg(test)]
        if self.fail_producer_spawn {
            return Err(EngineError::SpawnProducer(std::io::Error::other("injected spawn failure")));
        }
        producer.spawn(self.config.idle_sleep()).map_err(EngineError::SpawnProducer)
    }

    /// Tear down in order: producer (joined), stream (paused, closed), ring.
    ///
    /// Safe to call from any state, any number of times.
    pub fn stop(&mut self) {
        if self.state == EngineState::Stopped {
            return;
        }

        if let Some(mut producer) = self.producer.take() {
            producer.stop();
        }
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("failed to pause stream during teardown: {e}");
            }
            drop(stream);
        }
        self.ring = None;

        let from = self.state;
        self.state = EngineState::Stopped;
        if from != EngineState::Uninitialized {
            let s = self.stats();
            log::info!(
                "engine stopped at t={:.3}s ({} frames, {} script errors, {} underrun frames)",
                self.render.time_cursor(),
                s.frames_rendered,
                s.script_errors,
                s.underrun_frames
            );
        }
    }

    // --------------------------------------------------------------- control

    /// Replace the active script; streaming continues uninterrupted.
    /// Returns the handle that was replaced.
    pub fn swap_script(&self, script: ScriptHandle) -> Option<ScriptHandle> {
        log::info!("installing script '{}'", script.name());
        self.render.set_script_meta(None);
        self.render.swap_script(Some(script))
    }

    /// Like [`swap_script`](Self::swap_script), recording where the script came from.
    pub fn swap_script_from_file(&self, script: ScriptHandle, meta: ScriptMeta) -> Option<ScriptHandle> {
        log::info!("installing script '{}' from {}", script.name(), meta.path.display());
        let previous = self.render.swap_script(Some(script));
        self.render.set_script_meta(Some(meta));
        previous
    }

    /// Remove the script; the producer renders silence until the next swap.
    pub fn clear_script(&self) -> Option<ScriptHandle> {
        self.render.set_script_meta(None);
        self.render.swap_script(None)
    }

    /// Set the volume (clamped to [0, 1]); returns the stored value.
    pub fn set_volume(&self, volume: f32) -> f32 {
        self.render.set_volume(volume)
    }

    pub fn volume(&self) -> f32 {
        self.render.volume()
    }

    // ----------------------------------------------------------------- query

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn render_state(&self) -> &Arc<RenderState> {
        &self.render
    }

    pub fn time_cursor(&self) -> f64 {
        self.render.time_cursor()
    }

    pub fn script_meta(&self) -> Option<ScriptMeta> {
        self.render.script_meta()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.render.stats().snapshot()
    }

    /// Samples currently waiting in the ring (0 when no ring is allocated).
    pub fn buffered(&self) -> usize {
        self.ring.as_ref().map_or(0, |r| r.len())
    }
}

impl<B: AudioBackend> Drop for Engine<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
