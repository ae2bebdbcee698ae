//! Decode-quality metrics.
//!
//! Compares a decoded state or duration sequence against the generator's
//! ground truth. The decoders never see the truth; these comparisons happen
//! strictly outside the decode path.

use crate::error::{MarkovError, Result};

fn check_pair(name: &str, truth: &[usize], decoded: &[usize]) -> Result<()> {
    if truth.is_empty() {
        return Err(MarkovError::InvalidInput(format!("{name}: empty input")));
    }
    if truth.len() != decoded.len() {
        return Err(MarkovError::InvalidInput(format!(
            "{name}: length mismatch ({} vs {})",
            truth.len(),
            decoded.len()
        )));
    }
    Ok(())
}

/// Fraction of positions where the decoded state differs from the truth.
///
/// # Errors
///
/// Returns an error if the slices are empty or have different lengths.
pub fn mismatch_rate(truth: &[usize], decoded: &[usize]) -> Result<f64> {
    check_pair("mismatch_rate", truth, decoded)?;
    let wrong = truth
        .iter()
        .zip(decoded.iter())
        .filter(|(a, b)| a != b)
        .count();
    Ok(wrong as f64 / truth.len() as f64)
}

/// Fraction of segments whose decoded duration differs from the truth.
///
/// Same computation as [`mismatch_rate`], applied to parallel per-segment
/// duration lists instead of per-step states.
///
/// # Errors
///
/// Returns an error if the slices are empty or have different lengths.
pub fn duration_mismatch_rate(truth: &[usize], decoded: &[usize]) -> Result<f64> {
    check_pair("duration_mismatch_rate", truth, decoded)?;
    mismatch_rate(truth, decoded)
}

// ===========================================================================
// Tests
// ===========================================================================
