//! Producer: evaluates the script ahead of playback and fills the ring.
//!
//! The loop renders one block whenever the ring has room for a whole block,
//! yields after each block, and sleeps for `idle` while the ring is full. It
//! stops when its `running` flag is cleared; a block is always pushed in full
//! before the flag is checked again, so shutdown never leaves the ring in an
//! inconsistent state.
//!
//! Script failures never stop rendering: each failing call becomes one silent
//! sample. Logging is edge-triggered (warn when a failure streak starts, info
//! when it ends) so a broken script cannot flood the log at audio rate.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use livechip_core::dsp::condition;

use crate::error::{ScriptError, ScriptResult};
use crate::ring::RingBuffer;
use crate::script::ScriptCache;
use crate::state::RenderState;

pub const PRODUCER_THREAD_NAME: &str = "livechip-producer";

pub struct Producer {
    state: Arc<RenderState>,
    ring: Arc<RingBuffer>,
    cache: ScriptCache,
    failing: bool,
}

impl Producer {
    pub fn new(state: Arc<RenderState>, ring: Arc<RingBuffer>) -> Self {
        Self { state, ring, cache: ScriptCache::new(), failing: false }
    }

    /// One cycle: render a block if the ring has room for it.
    ///
    /// Returns `true` when a block was pushed.
    pub fn render_block(&mut self) -> bool {
        let block = self.state.frame_size();
        if self.ring.free_len() < block {
            return false;
        }
        for _ in 0..block {
            let sample = self.render_sample();
            if !self.ring.try_push(sample) {
                self.state.stats().add_dropped();
            }
        }
        self.state.stats().add_rendered(block as u64);
        true
    }

    /// Render blocks until the ring has no room for another one.
    /// Returns how many blocks were rendered.
    pub fn fill(&mut self) -> usize {
        let mut blocks = 0;
        while self.render_block() {
            blocks += 1;
        }
        blocks
    }

    fn render_sample(&mut self) -> f32 {
        let state = &self.state;
        let Some(script) = self.cache.refresh(state.script()) else {
            state.stats().add_silent();
            return 0.0;
        };

        let result = evaluate(script.sample(state.time_cursor()));
        state.advance_time();

        match result {
            Ok(v) => {
                if self.failing {
                    self.failing = false;
                    log::info!("script recovered at t={:.3}s", state.time_cursor());
                }
                condition(v, state.volume())
            }
            Err(e) => {
                state.stats().add_script_error();
                if self.failing {
                    log::debug!("script error: {e}");
                } else {
                    self.failing = true;
                    log::warn!("script error at t={:.3}s, rendering silence: {e}", state.time_cursor());
                }
                0.0
            }
        }
    }

    /// Producer loop; returns when `running` is cleared.
    pub fn run(mut self, running: &AtomicBool, idle: Duration) {
        self.state.set_producing(true);
        log::debug!("producer loop started (block={}, idle={idle:?})", self.state.frame_size());
        while running.load(Ordering::Acquire) {
            if self.render_block() {
                thread::yield_now();
            } else {
                thread::sleep(idle);
            }
        }
        self.state.set_producing(false);
        log::debug!("producer loop exited at t={:.3}s", self.state.time_cursor());
    }

    /// Move the producer onto its own thread.
    pub fn spawn(self, idle: Duration) -> io::Result<ProducerHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name(PRODUCER_THREAD_NAME.into())
            .spawn(move || self.run(&flag, idle))?;
        Ok(ProducerHandle { running, thread: Some(thread) })
    }
}

/// Reject non-finite values; they would otherwise clamp to full scale.
#[inline]
fn evaluate(result: ScriptResult<f64>) -> ScriptResult<f64> {
    match result {
        Ok(v) if !v.is_finite() => Err(ScriptError::NonFinite(v)),
        other => other,
    }
}

/// Owner of a running producer thread.
pub struct ProducerHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ProducerHandle {
    /// Clear the running flag and wait for the thread to exit. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("producer thread panicked");
            }
        }
    }
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::RenderConsumer;
    use crate::script::script_fn;
    use livechip_core::osc::sine;
    use std::time::Instant;

    const SR: u32 = 44_100;
    const BLOCK: usize = 512;
    const CAPACITY: usize = 4096;

    fn pipeline(volume: f32) -> (Arc<RenderState>, Arc<RingBuffer>, Producer, RenderConsumer) {
        let state = Arc::new(RenderState::new(SR, BLOCK, volume));
        let ring = Arc::new(RingBuffer::new(CAPACITY).unwrap());
        let producer = Producer::new(Arc::clone(&state), Arc::clone(&ring));
        let consumer = RenderConsumer::new(Arc::clone(&state), Arc::clone(&ring));
        (state, ring, producer, consumer)
    }

    #[test]
    fn steady_state_sine_matches_reference() {
        let (state, _ring, mut producer, consumer) = pipeline(1.0);
        state.swap_script(Some(script_fn(|t| Ok(sine(t, 440.0, 0.0)))));

        assert_eq!(producer.fill(), CAPACITY / BLOCK);
        let mut out = [0.0f32; BLOCK];
        for pull in 0..32usize {
            assert_eq!(consumer.fill(&mut out), BLOCK);
            for (i, &s) in out.iter().enumerate() {
                let t = (pull * BLOCK + i) as f64 / f64::from(SR);
                let expected = (2.0 * std::f64::consts::PI * 440.0 * t).sin() as f32;
                assert!((s - expected).abs() < 1e-5, "pull {pull} frame {i}: {s} vs {expected}");
            }
            assert!(out.iter().any(|&s| s != 0.0));
            assert!(producer.render_block());
        }
        assert_eq!(state.stats().snapshot().underrun_frames, 0);
    }

    #[test]
    fn missing_script_renders_silence_without_moving_time() {
        let (state, _ring, mut producer, consumer) = pipeline(1.0);
        producer.fill();
        let mut out = [1.0f32; BLOCK];
        for _ in 0..4 {
            assert_eq!(consumer.fill(&mut out), BLOCK);
            assert!(out.iter().all(|&s| s == 0.0));
        }
        assert_eq!(state.frame_cursor(), 0);
        assert_eq!(state.stats().snapshot().silent_frames, CAPACITY as u64);
    }

    #[test]
    fn failing_script_renders_silence_and_advances_time() {
        let (state, _ring, mut producer, consumer) = pipeline(1.0);
        state.swap_script(Some(script_fn(|_| Err(ScriptError::Failed("boom".into())))));

        producer.fill();
        assert_eq!(state.frame_cursor(), CAPACITY as u64);
        assert!(state.time_cursor() > 0.0);

        let mut out = [1.0f32; BLOCK];
        assert_eq!(consumer.fill(&mut out), BLOCK);
        assert!(out.iter().all(|&s| s == 0.0));

        assert!(producer.render_block());
        assert_eq!(state.frame_cursor(), (CAPACITY + BLOCK) as u64);
        assert_eq!(state.stats().snapshot().script_errors, (CAPACITY + BLOCK) as u64);
    }

    #[test]
    fn volume_scales_clamped_output() {
        let (state, _ring, mut producer, consumer) = pipeline(0.5);
        state.swap_script(Some(script_fn(|_| Ok(1.0))));
        producer.render_block();
        let mut out = [0.0f32; BLOCK];
        consumer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0.5));

        state.swap_script(Some(script_fn(|_| Ok(-8.0))));
        producer.render_block();
        consumer.fill(&mut out);
        assert!(out.iter().all(|&s| s == -0.5));
    }

    #[test]
    fn non_finite_results_are_errors() {
        let (state, _ring, mut producer, consumer) = pipeline(1.0);
        state.swap_script(Some(script_fn(|t| Ok(if t == 0.0 { f64::NAN } else { f64::INFINITY }))));
        producer.render_block();
        let mut out = [1.0f32; BLOCK];
        consumer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(state.stats().snapshot().script_errors, BLOCK as u64);
    }

    #[test]
    fn full_ring_backs_off_then_resumes() {
        let (state, ring, mut producer, consumer) = pipeline(1.0);
        state.swap_script(Some(script_fn(|_| Ok(0.1))));
        producer.fill();
        assert!(ring.is_full());
        let cursor = state.frame_cursor();

        assert!(!producer.render_block());
        assert_eq!(state.frame_cursor(), cursor);

        let mut out = [0.0f32; BLOCK];
        consumer.fill(&mut out);
        assert!(producer.render_block());
        assert!(ring.is_full());
        assert_eq!(state.stats().snapshot().dropped_samples, 0);
    }

    #[test]
    fn headroom_smaller_than_a_block_is_left_alone() {
        let (state, ring, mut producer, consumer) = pipeline(1.0);
        state.swap_script(Some(script_fn(|_| Ok(0.1))));
        producer.fill();
        let mut some = [0.0f32; BLOCK - 1];
        consumer.fill(&mut some);
        assert!(!producer.render_block());
        assert_eq!(ring.len(), CAPACITY - (BLOCK - 1));
    }

    #[test]
    fn thread_fills_ring_and_stops_cleanly() {
        let (state, ring, producer, consumer) = pipeline(1.0);
        state.swap_script(Some(script_fn(|_| Ok(0.2))));
        let mut handle = producer.spawn(Duration::from_micros(100)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = [0.0f32; BLOCK];
        let mut pulled = 0;
        while pulled < 20 && Instant::now() < deadline {
            if ring.len() >= BLOCK {
                consumer.fill(&mut out);
                assert!(out.iter().all(|&s| (s - 0.2).abs() < 1e-6));
                pulled += 1;
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }
        assert_eq!(pulled, 20);

        assert!(state.is_producing());
        handle.stop();
        assert!(!state.is_producing());
        let cursor = state.frame_cursor();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(state.frame_cursor(), cursor);
        handle.stop();
    }
}
