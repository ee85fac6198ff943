//! Boundary table for the drift-corrected delivery size. Written against
//! the four-branch gap comparison before anything else trusted it.

use crate::drift::{Correction, DRIFT_QUANTUM, DriftCompensator};

const CAPACITY: usize = 768;
const PACKET: usize = 192;
const BASE: usize = CAPACITY / 2;

fn compensator() -> DriftCompensator {
    DriftCompensator::new(CAPACITY, PACKET)
}

#[test]
fn gap_equal_to_base_is_uncorrected() {
    let (chunk, correction) = compensator().corrected_chunk(384, 0);
    assert_eq!(chunk, BASE);
    assert_eq!(correction, Correction::None);
}

#[test]
fn mid_band_gap_is_uncorrected() {
    // write=760, read=384: write-ahead gap 376 sits between both
    // thresholds (192 and 576).
    let (chunk, correction) = compensator().corrected_chunk(760, 384);
    assert_eq!(chunk, BASE);
    assert_eq!(correction, Correction::None);
}

#[test]
fn starving_gap_shrinks_delivery() {
    let (chunk, correction) = compensator().corrected_chunk(190, 0);
    assert_eq!(chunk, BASE - DRIFT_QUANTUM);
    assert_eq!(correction, Correction::Shrink);
}

#[test]
fn starving_gap_across_the_wrap_shrinks_delivery() {
    // read=580 ahead of write=0 in raw offsets; wrap-aware write-ahead gap
    // is 188, inside the starvation band.
    let (chunk, correction) = compensator().corrected_chunk(0, 580);
    assert_eq!(chunk, BASE - DRIFT_QUANTUM);
    assert_eq!(correction, Correction::Shrink);
}

#[test]
fn nearly_lapped_gap_grows_delivery() {
    let (chunk, correction) = compensator().corrected_chunk(577, 0);
    assert_eq!(chunk, BASE + DRIFT_QUANTUM);
    assert_eq!(correction, Correction::Grow);
}

#[test]
fn nearly_lapped_gap_across_the_wrap_grows_delivery() {
    // write=100, read=291: wrap-aware gap 577, one past the upper
    // threshold.
    let (chunk, correction) = compensator().corrected_chunk(100, 291);
    assert_eq!(chunk, BASE + DRIFT_QUANTUM);
    assert_eq!(correction, Correction::Grow);
}

#[test]
fn exact_thresholds_are_uncorrected() {
    let (chunk, correction) = compensator().corrected_chunk(PACKET, 0);
    assert_eq!(chunk, BASE);
    assert_eq!(correction, Correction::None);

    let (chunk, correction) = compensator().corrected_chunk(CAPACITY - PACKET, 0);
    assert_eq!(chunk, BASE);
    assert_eq!(correction, Correction::None);
}

#[test]
fn converged_cursors_shrink_delivery() {
    let (chunk, correction) = compensator().corrected_chunk(0, 0);
    assert_eq!(chunk, BASE - DRIFT_QUANTUM);
    assert_eq!(correction, Correction::Shrink);
}
