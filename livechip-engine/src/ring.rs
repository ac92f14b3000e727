//! Lock-free SPSC ring buffer for rendered mono samples.
//!
//! The only data channel between the producer thread and the audio callback.
//! Neither side ever blocks:
//! - `try_push` drops the sample and returns `false` when the ring is full
//! - `try_pop_block` copies what is available and reports how much it copied
//!
//! Storage is a fixed arena of `AtomicU32` holding `f32` bit patterns, so the
//! structure needs no `unsafe`. Ownership of the indices is split: the producer
//! alone moves `write_index`, the consumer alone moves `read_index`, and the
//! shared `count` is the synchronisation point (release on update, acquire on
//! read). A slot is therefore never read before it is written, and never
//! overwritten before it is read.
//!
//! Calling the producer half from two threads at once (or the consumer half) is
//! a logic error; the engine hands out exactly one of each.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::error::{EngineError, EngineResult};

pub struct RingBuffer {
    slots: Box<[AtomicU32]>,
    /// Next slot the consumer reads (consumer-owned).
    read_index: AtomicUsize,
    /// Next slot the producer writes (producer-owned).
    write_index: AtomicUsize,
    /// Occupied slots, in [0, capacity].
    count: AtomicUsize,
}

impl RingBuffer {
    /// Allocate a ring holding `capacity` samples, all silent.
    ///
    /// A capacity the allocator cannot satisfy is reported as
    /// [`EngineError::Alloc`] instead of aborting.
    pub fn new(capacity: usize) -> EngineResult<Self> {
        if capacity == 0 {
            return Err(EngineError::InvalidConfig("ring capacity must be > 0".into()));
        }
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|e| EngineError::Alloc { samples: capacity, reason: e.to_string() })?;
        slots.extend((0..capacity).map(|_| AtomicU32::new(0.0_f32.to_bits())));
        Ok(Self {
            slots: slots.into_boxed_slice(),
            read_index: AtomicUsize::new(0),
            write_index: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Samples ready for the consumer.
    #[inline]
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Slots the producer can still fill.
    #[inline]
    pub fn free_len(&self) -> usize {
        self.capacity() - self.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    #[inline]
    fn advance(&self, index: usize, by: usize) -> usize {
        (index + by) % self.capacity()
    }

    // ---------------------------------------------------------------- producer

    /// Append one sample. Returns `false` (and drops the sample) when full.
    #[inline]
    pub fn try_push(&self, sample: f32) -> bool {
        if self.count.load(Ordering::Acquire) >= self.capacity() {
            return false;
        }
        let w = self.write_index.load(Ordering::Relaxed);
        self.slots[w].store(sample.to_bits(), Ordering::Relaxed);
        self.write_index.store(self.advance(w, 1), Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Append as many of `samples` as fit, publishing them with a single count
    /// update. Returns the number written.
    pub fn push_slice(&self, samples: &[f32]) -> usize {
        let n = samples.len().min(self.free_len());
        if n == 0 {
            return 0;
        }
        let mut w = self.write_index.load(Ordering::Relaxed);
        for &s in &samples[..n] {
            self.slots[w].store(s.to_bits(), Ordering::Relaxed);
            w = self.advance(w, 1);
        }
        self.write_index.store(w, Ordering::Relaxed);
        self.count.fetch_add(n, Ordering::AcqRel);
        n
    }

    // ---------------------------------------------------------------- consumer

    /// Copy up to `dest.len()` samples into `dest`, oldest first.
    ///
    /// Returns how many slots were filled; the rest of `dest` is left untouched
    /// for the caller to silence.
    #[inline]
    pub fn try_pop_block(&self, dest: &mut [f32]) -> usize {
        let n = dest.len().min(self.count.load(Ordering::Acquire));
        if n == 0 {
            return 0;
        }
        let mut r = self.read_index.load(Ordering::Relaxed);
        for d in &mut dest[..n] {
            *d = f32::from_bits(self.slots[r].load(Ordering::Relaxed));
            r = self.advance(r, 1);
        }
        self.read_index.store(r, Ordering::Relaxed);
        self.count.fetch_sub(n, Ordering::AcqRel);
        n
    }

    /// Indices as `(read, write)`; for diagnostics and tests.
    pub fn indices(&self) -> (usize, usize) {
        (
            self.read_index.load(Ordering::Relaxed),
            self.write_index.load(Ordering::Relaxed),
        )
    }
}

impl core::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (read, write) = self.indices();
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("read", &read)
            .field("write", &write)
            .finish()
    }
}
