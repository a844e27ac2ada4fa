//! Hamming distance between equal-width responses.

use crate::codec::BitString;
use crate::error::{PufError, Result};

/// Number of bit positions where `a` and `b` differ.
pub fn hamming(a: &BitString, b: &BitString) -> Result<usize> {
    if a.len() != b.len() {
        return Err(PufError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .map(|(x, y)| (x ^ y).count_ones() as usize)
        .sum())
}

/// Row-aligned distances between two response sequences.
///
/// Row `k` of `a` is compared with row `k` of `b`; the shorter sequence
/// bounds the number of comparisons.
pub fn aligned_distances(a: &[BitString], b: &[BitString]) -> Result<Vec<usize>> {
    a.iter().zip(b).map(|(x, y)| hamming(x, y)).collect()
}

/// Distances between each consecutive pair of rows (N rows → N−1 distances).
pub fn consecutive_distances(rows: &[BitString]) -> Result<Vec<usize>> {
    rows.windows(2).map(|w| hamming(&w[0], &w[1])).collect()
}
