//! Half-buffered byte ring shared between the packet and frame-tick paths.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::AudioClassError;

/// Lock-free byte ring with two single-writer cursors.
///
/// The packet-arrival path owns `write_cursor`, the frame-tick path owns
/// `read_cursor`; the foreign context only ever *loads* the other cursor,
/// and only through [`StreamBuffer::snapshot`] so a drift comparison works
/// on one sampled value instead of re-reading mid-computation. Both cursors
/// wrap to zero exactly at the capacity — the engine guarantees packet
/// sizes divide the capacity evenly, so a write never straddles the wrap
/// point.
pub struct StreamBuffer {
    data: UnsafeCell<Box<[u8]>>,
    capacity: usize,
    write_cursor: AtomicUsize,
    read_cursor: AtomicUsize,
    primed: AtomicBool,
}

// Safety: each cursor has exactly one writing context, and the half-buffer
// discipline keeps the byte regions touched by the two contexts disjoint.
unsafe impl Send for StreamBuffer {}
unsafe impl Sync for StreamBuffer {}

impl StreamBuffer {
    /// Allocate a zeroed ring of `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self, AudioClassError> {
        let mut storage: Vec<u8> = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| AudioClassError::AllocationFailure)?;
        storage.resize(capacity, 0);
        Ok(Self {
            data: UnsafeCell::new(storage.into_boxed_slice()),
            capacity,
            write_cursor: AtomicUsize::new(0),
            read_cursor: AtomicUsize::new(0),
            primed: AtomicBool::new(false),
        })
    }

    fn data_slice(&self) -> &[u8] {
        unsafe { &*self.data.get() }
    }

    #[allow(clippy::mut_from_ref)]
    fn data_slice_mut(&self) -> &mut [u8] {
        unsafe { &mut *self.data.get() }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size of one half-buffer.
    pub fn half(&self) -> usize {
        self.capacity / 2
    }

    /// Current write cursor.
    pub fn write_cursor(&self) -> usize {
        self.write_cursor.load(Ordering::Acquire)
    }

    /// Current read cursor.
    pub fn read_cursor(&self) -> usize {
        self.read_cursor.load(Ordering::Acquire)
    }

    /// Sample both cursors once, for a wrap-aware gap computation.
    pub fn snapshot(&self) -> (usize, usize) {
        (
            self.write_cursor.load(Ordering::Acquire),
            self.read_cursor.load(Ordering::Acquire),
        )
    }

    /// Copy `bytes` into place at the write cursor without publishing them,
    /// returning the staged region. The sink observes received audio at its
    /// final buffer location before the cursor moves.
    pub fn stage(&self, bytes: &[u8]) -> &[u8] {
        let wr = self.write_cursor.load(Ordering::Relaxed);
        debug_assert!(
            wr + bytes.len() <= self.capacity,
            "write must not straddle the wrap point"
        );
        let data = self.data_slice_mut();
        data[wr..wr + bytes.len()].copy_from_slice(bytes);
        &self.data_slice()[wr..wr + bytes.len()]
    }

    /// Publish `len` staged bytes. Returns the new write cursor, already
    /// wrapped to zero if it reached the capacity.
    pub fn advance_write(&self, len: usize) -> usize {
        let mut wr = self.write_cursor.load(Ordering::Relaxed) + len;
        if wr >= self.capacity {
            wr -= self.capacity;
        }
        self.write_cursor.store(wr, Ordering::Release);
        wr
    }

    /// Copy and publish in one step. Returns the post-write cursor.
    pub fn write(&self, bytes: &[u8]) -> usize {
        self.stage(bytes);
        self.advance_write(bytes.len())
    }

    /// Move the read cursor forward by `amount`, wrapping at the capacity.
    pub fn advance_read(&self, amount: usize) -> usize {
        let mut rd = self.read_cursor.load(Ordering::Relaxed) + amount;
        if rd >= self.capacity {
            rd -= self.capacity;
        }
        self.read_cursor.store(rd, Ordering::Release);
        rd
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn region(&self, offset: usize, len: usize) -> &[u8] {
        &self.data_slice()[offset..offset + len]
    }

    /// Whether the first midpoint fill has been reached this session.
    pub fn is_primed(&self) -> bool {
        self.primed.load(Ordering::Acquire)
    }

    /// Latch the midpoint fill. Called by the packet path, at most once per
    /// session.
    pub fn mark_primed(&self) {
        self.primed.store(true, Ordering::Release);
    }
}
