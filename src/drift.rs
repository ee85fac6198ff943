//! Per-tick drift correction between the USB frame clock and the local
//! audio clock.

/// Bytes added to or removed from one tick's delivery when a correction
/// fires.
///
/// The correction is deliberately tiny and applied every tick: frame
/// cadence is already hardware-regular, so it only has to cancel slow
/// drift, and a larger step would itself be audible.
pub const DRIFT_QUANTUM: usize = 4;

/// Which branch of the gap comparison a tick took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Correction {
    /// Cursors safely separated; the nominal half-buffer is delivered.
    None,
    /// The read side is about to starve the write side; deliver less so the
    /// write cursor catches up.
    Shrink,
    /// The write side has almost lapped the read side; deliver more so the
    /// read cursor catches up.
    Grow,
}

/// Computes the corrected per-tick delivery size from a cursor snapshot.
#[derive(Clone, Copy, Debug)]
pub struct DriftCompensator {
    capacity: usize,
    packet_size: usize,
}

impl DriftCompensator {
    /// Build a compensator for a ring of `capacity` bytes filled in
    /// `packet_size` increments.
    pub fn new(capacity: usize, packet_size: usize) -> Self {
        Self {
            capacity,
            packet_size,
        }
    }

    /// Nominal per-tick delivery: half the ring.
    pub fn base(&self) -> usize {
        self.capacity / 2
    }

    /// Corrected chunk size for one tick.
    ///
    /// `write_cursor` and `read_cursor` must come from a single snapshot;
    /// the gap is the unsigned wrap-aware distance from read to write, so
    /// both the read-ahead and write-ahead cases fall out of one
    /// subtraction. Signed differences get the direction test wrong for
    /// cursors living in `[0, capacity)`.
    pub fn corrected_chunk(&self, write_cursor: usize, read_cursor: usize) -> (usize, Correction) {
        let gap = if write_cursor >= read_cursor {
            write_cursor - read_cursor
        } else {
            self.capacity - (read_cursor - write_cursor)
        };

        if gap < self.packet_size {
            (self.base() - DRIFT_QUANTUM, Correction::Shrink)
        } else if gap > self.capacity - self.packet_size {
            (self.base() + DRIFT_QUANTUM, Correction::Grow)
        } else {
            (self.base(), Correction::None)
        }
    }
}
