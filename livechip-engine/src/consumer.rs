//! Consumer: the body of the audio backend's output callback.
//!
//! Runs on the backend's real-time thread, so it only zero-fills, copies out of
//! the ring and bumps two relaxed counters. No locks, no allocation, no script
//! calls, no logging.

use std::sync::Arc;

use crate::ring::RingBuffer;
use crate::state::RenderState;

/// The single reader of a ring. Not `Clone`: the engine hands out exactly one
/// per stream, and the backend moves it into its callback.
///
/// ```compile_fail
/// fn second_reader<T: Clone>() {}
/// second_reader::<livechip_engine::RenderConsumer>();
/// ```
#[derive(Default)]
pub struct RenderConsumer {
    state: Option<Arc<RenderState>>,
    ring: Option<Arc<RingBuffer>>,
}

impl RenderConsumer {
    pub fn new(state: Arc<RenderState>, ring: Arc<RingBuffer>) -> Self {
        Self { state: Some(state), ring: Some(ring) }
    }

    /// A consumer with nothing attached; always renders silence.
    pub fn detached() -> Self {
        Self::default()
    }

    /// Fill `out` with the next rendered samples.
    ///
    /// `out` is zeroed first; whatever the ring cannot supply stays silent.
    /// Returns the number of real samples copied.
    #[inline]
    pub fn fill(&self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        let Some(ring) = &self.ring else {
            return 0;
        };
        let n = ring.try_pop_block(out);
        if let Some(state) = &self.state {
            state.stats().record_callback(out.len() - n);
        }
        n
    }

    pub fn render_state(&self) -> Option<&Arc<RenderState>> {
        self.state.as_ref()
    }

    pub fn ring(&self) -> Option<&Arc<RingBuffer>> {
        self.ring.as_ref()
    }
}
