//! Log-domain probability primitives.
//!
//! All decoding in this crate runs in natural-log space to avoid underflow on
//! long sequences. A probability of exactly zero is represented by negative
//! infinity, which the max-based Viterbi recursions treat as "no valid
//! hypothesis": it can never win a maximum against any finite candidate.

/// Natural log of a probability, with an exact zero mapped to `-inf`.
///
/// Used at every site that combines transition, duration, or emission
/// probabilities, so a structurally impossible event never produces a
/// math-domain error.
#[inline]
pub fn ln_prob(p: f64) -> f64 {
    if p == 0.0 {
        f64::NEG_INFINITY
    } else {
        p.ln()
    }
}

/// Merge two equal-length log-probability slices into one.
///
/// Each cell takes whichever operand is finite; when both are `-inf` the
/// result is `-inf`. The operands' finite regions must be disjoint — the
/// caller guarantees that at most one of the two inputs holds a valid
/// hypothesis per cell (checked in debug builds). This is how the semi-Markov
/// decoder reconciles segment-start and mid-segment hypotheses at early time
/// steps, where the two candidate tables are valid on complementary duration
/// ranges.
pub fn merge_deltas(a: &[f64], b: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.len(), b.len(), "merge_deltas: shape mismatch");
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            debug_assert!(
                x == f64::NEG_INFINITY || y == f64::NEG_INFINITY,
                "merge_deltas: both operands finite at the same cell ({x} and {y})"
            );
            if x == f64::NEG_INFINITY {
                y
            } else {
                x
            }
        })
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================
