//! Shared render state: time cursor, volume, script slot and counters.
//!
//! One `RenderState` lives for a whole engine session and is shared (via `Arc`)
//! by the control path, the producer thread and the audio callback. Every field
//! is either immutable or atomic; the only lock is inside the script slot and
//! the audio callback never touches it.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use livechip_core::dsp::sanitize_volume;
use parking_lot::Mutex;

use crate::script::{ScriptHandle, ScriptMeta, ScriptSlot};

/// Monotonic counters, updated with relaxed atomics.
#[derive(Debug, Default)]
pub struct RenderStats {
    frames_rendered: AtomicU64,
    script_errors: AtomicU64,
    silent_frames: AtomicU64,
    dropped_samples: AtomicU64,
    underrun_frames: AtomicU64,
    callbacks: AtomicU64,
}

/// Point-in-time copy of [`RenderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Samples pushed by the producer (including silence).
    pub frames_rendered: u64,
    /// Script calls that failed or returned a non-numeric/non-finite value.
    pub script_errors: u64,
    /// Samples rendered while no script was installed.
    pub silent_frames: u64,
    /// Samples the producer could not push because the ring was full.
    pub dropped_samples: u64,
    /// Zeros the consumer had to write because the ring ran dry.
    pub underrun_frames: u64,
    /// Consumer invocations.
    pub callbacks: u64,
}

impl RenderStats {
    #[inline]
    pub(crate) fn add_rendered(&self, n: u64) {
        self.frames_rendered.fetch_add(n, Ordering::Relaxed);
    }
    #[inline]
    pub(crate) fn add_script_error(&self) {
        self.script_errors.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub(crate) fn add_silent(&self) {
        self.silent_frames.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub(crate) fn add_dropped(&self) {
        self.dropped_samples.fetch_add(1, Ordering::Relaxed);
    }
    #[inline]
    pub(crate) fn record_callback(&self, underrun: usize) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        if underrun > 0 {
            self.underrun_frames.fetch_add(underrun as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_rendered: self.frames_rendered.load(Ordering::Relaxed),
            script_errors: self.script_errors.load(Ordering::Relaxed),
            silent_frames: self.silent_frames.load(Ordering::Relaxed),
            dropped_samples: self.dropped_samples.load(Ordering::Relaxed),
            underrun_frames: self.underrun_frames.load(Ordering::Relaxed),
            callbacks: self.callbacks.load(Ordering::Relaxed),
        }
    }
}

pub struct RenderState {
    sample_rate: u32,
    frame_size: usize,
    /// Time cursor in frames; only the producer advances it.
    frame_cursor: AtomicU64,
    /// `f32` bits, always within [0, 1].
    volume: AtomicU32,
    script: ScriptSlot,
    meta: Mutex<Option<ScriptMeta>>,
    producing: AtomicBool,
    stats: RenderStats,
}

impl RenderState {
    pub fn new(sample_rate: u32, frame_size: usize, volume: f32) -> Self {
        Self {
            sample_rate,
            frame_size,
            frame_cursor: AtomicU64::new(0),
            volume: AtomicU32::new(sanitize_volume(volume).to_bits()),
            script: ScriptSlot::new(),
            meta: Mutex::new(None),
            producing: AtomicBool::new(false),
            stats: RenderStats::default(),
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    // ------------------------------------------------------------------ time

    /// Frames the script has been evaluated for.
    #[inline]
    pub fn frame_cursor(&self) -> u64 {
        self.frame_cursor.load(Ordering::Acquire)
    }

    /// Script time in seconds.
    #[inline]
    pub fn time_cursor(&self) -> f64 {
        self.frame_cursor() as f64 / f64::from(self.sample_rate)
    }

    /// Move the cursor by one frame (`1 / sample_rate` seconds).
    #[inline]
    pub(crate) fn advance_time(&self) {
        self.frame_cursor.fetch_add(1, Ordering::AcqRel);
    }

    // ---------------------------------------------------------------- volume

    #[inline]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Set the volume, clamped to [0, 1]. Returns the value actually stored.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let v = sanitize_volume(volume);
        self.volume.store(v.to_bits(), Ordering::Relaxed);
        v
    }

    // ---------------------------------------------------------------- script

    #[inline]
    pub fn script(&self) -> &ScriptSlot {
        &self.script
    }

    /// Publish a new script; returns the one it replaced.
    pub fn swap_script(&self, script: Option<ScriptHandle>) -> Option<ScriptHandle> {
        self.script.swap(script)
    }

    pub fn set_script_meta(&self, meta: Option<ScriptMeta>) {
        *self.meta.lock() = meta;
    }

    pub fn script_meta(&self) -> Option<ScriptMeta> {
        self.meta.lock().clone()
    }

    // ------------------------------------------------------------ bookkeeping

    /// Whether a producer thread is currently inside its loop.
    #[inline]
    pub fn is_producing(&self) -> bool {
        self.producing.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_producing(&self, on: bool) {
        self.producing.store(on, Ordering::Release);
    }

    #[inline]
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }
}

impl core::fmt::Debug for RenderState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RenderState")
            .field("sample_rate", &self.sample_rate)
            .field("frame_size", &self.frame_size)
            .field("time", &self.time_cursor())
            .field("volume", &self.volume())
            .field("script_generation", &self.script.generation())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::script_fn;

    #[test]
    fn time_advances_in_sample_steps() {
        let st = RenderState::new(48_000, 256, 1.0);
        assert_eq!(st.time_cursor(), 0.0);
        for _ in 0..48_000 {
            st.advance_time();
        }
        assert_eq!(st.frame_cursor(), 48_000);
        assert!((st.time_cursor() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn volume_is_clamped_on_write() {
        let st = RenderState::new(44_100, 512, 3.0);
        assert_eq!(st.volume(), 1.0);
        assert_eq!(st.set_volume(0.25), 0.25);
        assert_eq!(st.volume(), 0.25);
        assert_eq!(st.set_volume(-1.0), 0.0);
        assert_eq!(st.set_volume(f32::INFINITY), 0.0);
    }

    #[test]
    fn script_and_meta_round_trip() {
        let st = RenderState::new(44_100, 512, 0.5);
        assert!(st.swap_script(Some(script_fn(|_| Ok(0.0)))).is_none());
        assert!(st.script().is_set());
        assert!(st.script_meta().is_none());
        let meta = ScriptMeta { path: "song.lua".into(), modified: None };
        st.set_script_meta(Some(meta.clone()));
        assert_eq!(st.script_meta(), Some(meta));
    }

    #[test]
    fn stats_accumulate() {
        let st = RenderState::new(44_100, 512, 0.5);
        st.stats().add_rendered(512);
        st.stats().add_script_error();
        st.stats().record_callback(0);
        st.stats().record_callback(12);
        let s = st.stats().snapshot();
        assert_eq!(s.frames_rendered, 512);
        assert_eq!(s.script_errors, 1);
        assert_eq!(s.callbacks, 2);
        assert_eq!(s.underrun_frames, 12);
    }
}
