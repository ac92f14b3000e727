//! Script handles and the slot that publishes them to the producer.
//!
//! A script is anything implementing [`SampleScript`]: one call per sample, time
//! in, amplitude out. The producer never sees the slot's lock on its hot path;
//! it keeps a cloned handle in a [`ScriptCache`] and only re-reads the slot when
//! the generation counter moves.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::error::ScriptResult;

#[cfg(feature = "lua")]
pub mod lua;

/// A sample-generating function of time (seconds).
///
/// The returned value may be any number; the producer clamps it to [-1, 1].
/// Errors are turned into one silent sample each.
pub trait SampleScript: Send + Sync {
    fn sample(&self, t: f64) -> ScriptResult<f64>;

    /// Label used in log lines.
    fn name(&self) -> &str {
        "script"
    }
}

pub type ScriptHandle = Arc<dyn SampleScript>;

struct FnScript<F>(F);

impl<F> SampleScript for FnScript<F>
where
    F: Fn(f64) -> ScriptResult<f64> + Send + Sync,
{
    #[inline]
    fn sample(&self, t: f64) -> ScriptResult<f64> {
        (self.0)(t)
    }

    fn name(&self) -> &str {
        "native"
    }
}

/// Wrap a closure as a script handle.
pub fn script_fn<F>(f: F) -> ScriptHandle
where
    F: Fn(f64) -> ScriptResult<f64> + Send + Sync + 'static,
{
    Arc::new(FnScript(f))
}

/// Where the active script came from, for reload detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptMeta {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

impl ScriptMeta {
    /// Read the modification time of `path` now.
    pub fn read_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
        Self { path, modified }
    }
}

/// Versioned, swappable script handle.
///
/// Every swap bumps `generation` after the new handle is in place, so a reader
/// that sees a new generation and then takes the lock always gets a complete
/// handle, never a half-updated one.
pub struct ScriptSlot {
    current: Mutex<Option<ScriptHandle>>,
    generation: AtomicU64,
}

impl ScriptSlot {
    pub fn new() -> Self {
        Self { current: Mutex::new(None), generation: AtomicU64::new(0) }
    }

    /// Install `script` (or clear with `None`); returns the previous handle.
    pub fn swap(&self, script: Option<ScriptHandle>) -> Option<ScriptHandle> {
        let mut current = self.current.lock();
        let previous = std::mem::replace(&mut *current, script);
        self.generation.fetch_add(1, Ordering::Release);
        previous
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Consistent `(generation, handle)` pair.
    pub fn load(&self) -> (u64, Option<ScriptHandle>) {
        let current = self.current.lock();
        (self.generation.load(Ordering::Acquire), current.clone())
    }

    pub fn is_set(&self) -> bool {
        self.current.lock().is_some()
    }
}

impl Default for ScriptSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer-side copy of the slot.
pub struct ScriptCache {
    generation: u64,
    handle: Option<ScriptHandle>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self { generation: u64::MAX, handle: None }
    }

    /// Current script, reloading from `slot` only when it changed.
    #[inline]
    pub fn refresh(&mut self, slot: &ScriptSlot) -> Option<&dyn SampleScript> {
        if slot.generation() != self.generation {
            let (generation, handle) = slot.load();
            self.generation = generation;
            self.handle = handle;
            if let Some(h) = &self.handle {
                log::debug!("producer picked up script '{}' (generation {generation})", h.name());
            }
        }
        self.handle.as_deref()
    }
}

impl Default for ScriptCache {
    fn default() -> Self {
        Self::new()
    }
}
