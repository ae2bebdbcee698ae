//! Model interfaces: emission, duration, and observation laws.
//!
//! Decoders consume *evaluation* capabilities (probability of an observation
//! or segment given a state); generators consume *sampling* capabilities
//! (draw an observation or duration). The two directions are distinct traits
//! rather than one overloaded interface, because HMM and semi-Markov decoders
//! consume different shapes: per-observation vs per-segment likelihoods.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{MarkovError, Result};

/// Tolerance for probability-sum validation.
pub(crate) const PROB_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Decoder-side interfaces
// ---------------------------------------------------------------------------

/// Per-observation emission likelihood `b(j, o_t)` for HMM decoding.
pub trait EmissionModel<O> {
    /// Probability in `[0, 1]` of observing `obs` in state `state`.
    fn prob(&self, state: usize, obs: &O) -> f64;
}

impl<O, F> EmissionModel<O> for F
where
    F: Fn(usize, &O) -> f64,
{
    fn prob(&self, state: usize, obs: &O) -> f64 {
        self(state, obs)
    }
}

/// Per-segment emission likelihood `b(j, o_{t..t+d})` for semi-Markov decoding.
///
/// Evaluated once per hypothesized whole segment: emissions within a state
/// visit are jointly generated by a duration-conditioned process, not
/// independently per step.
pub trait SegmentEmissionModel<O> {
    /// Probability in `[0, 1]` of the contiguous `segment` in state `state`.
    fn prob(&self, state: usize, segment: &[O]) -> f64;
}

impl<O, F> SegmentEmissionModel<O> for F
where
    F: Fn(usize, &[O]) -> f64,
{
    fn prob(&self, state: usize, segment: &[O]) -> f64 {
        self(state, segment)
    }
}

/// State-independent duration mass `pd(d)` for semi-Markov decoding,
/// defined for durations `d >= 1`.
pub trait DurationModel {
    /// Probability in `[0, 1]` that a state persists for exactly `duration`
    /// time steps.
    fn prob(&self, duration: usize) -> f64;
}

impl<F> DurationModel for F
where
    F: Fn(usize) -> f64,
{
    fn prob(&self, duration: usize) -> f64 {
        self(duration)
    }
}

// ---------------------------------------------------------------------------
// Generator-side interfaces
// ---------------------------------------------------------------------------

/// Observation sampler for sequence generation: draws one observation from a
/// state's emission law. Implementors own their randomness, so repeated calls
/// may return different values.
pub trait ObservationLaw {
    /// The observation type produced (a scalar, a vector, anything opaque to
    /// the decoders).
    type Obs;

    /// Draw one observation conditioned on the current state.
    fn sample(&mut self, state: usize) -> Self::Obs;
}

/// Duration sampler for semi-Markov generation. Also exposes the mass of a
/// realized duration so generated data can be scored by the decoder-side
/// duration model it came from.
pub trait DurationLaw {
    /// Draw one duration (>= 1).
    fn sample(&mut self) -> usize;

    /// Probability mass of drawing exactly `duration`.
    fn prob(&self, duration: usize) -> f64;
}

// ---------------------------------------------------------------------------
// State labels
// ---------------------------------------------------------------------------

/// Bijective mapping between application-facing state labels and the dense
/// integer indices used inside the decoders.
///
/// The DP recursions never touch labels; callers translate at the API
/// boundary.
#[derive(Debug, Clone)]
pub struct StateLabels<S> {
    labels: Vec<S>,
    index: HashMap<S, usize>,
}

impl<S: Eq + Hash + Clone> StateLabels<S> {
    /// Build a label table from an ordered list of distinct labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty or contains duplicates.
    pub fn new(labels: Vec<S>) -> Result<Self> {
        if labels.is_empty() {
            return Err(MarkovError::InvalidInput("state list is empty".into()));
        }
        let mut index = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            if index.insert(label.clone(), i).is_some() {
                return Err(MarkovError::InvalidInput(format!(
                    "duplicate state label at position {i}"
                )));
            }
        }
        Ok(Self { labels, index })
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the table is empty (never true for a constructed table).
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Dense index of a label, if present.
    pub fn index_of(&self, label: &S) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Label at a dense index, if in range.
    pub fn label(&self, index: usize) -> Option<&S> {
        self.labels.get(index)
    }

    /// Translate a decoded index path back into labels.
    ///
    /// # Errors
    ///
    /// Returns an error if any index is out of range.
    pub fn relabel(&self, path: &[usize]) -> Result<Vec<S>> {
        path.iter()
            .map(|&i| {
                self.labels.get(i).cloned().ok_or_else(|| {
                    MarkovError::InvalidInput(format!(
                        "state index {i} out of range (n_states = {})",
                        self.labels.len()
                    ))
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Shared parameter validation
// ---------------------------------------------------------------------------

/// Validate a probability distribution: expected length, sums to ~1.
pub(crate) fn validate_distribution(name: &str, probs: &[f64], expected_len: usize) -> Result<()> {
    if probs.len() != expected_len {
        return Err(MarkovError::InvalidInput(format!(
            "{name} length {} != expected {expected_len}",
            probs.len()
        )));
    }
    let sum: f64 = probs.iter().sum();
    if (sum - 1.0).abs() > PROB_TOLERANCE {
        return Err(MarkovError::InvalidInput(format!(
            "{name} sums to {sum}, expected ~1.0"
        )));
    }
    Ok(())
}

/// Validate a row-major `n x n` row-stochastic transition matrix.
pub(crate) fn validate_transition(transition: &[f64], n_states: usize) -> Result<()> {
    if transition.len() != n_states * n_states {
        return Err(MarkovError::InvalidInput(format!(
            "transition length {} != n_states*n_states {}",
            transition.len(),
            n_states * n_states
        )));
    }
    for i in 0..n_states {
        let row_sum: f64 = transition[i * n_states..(i + 1) * n_states].iter().sum();
        if (row_sum - 1.0).abs() > PROB_TOLERANCE {
            return Err(MarkovError::InvalidInput(format!(
                "transition row {i} sums to {row_sum}, expected ~1.0"
            )));
        }
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn generic_emission_score<O, B: EmissionModel<O>>(b: &B, obs: &O) -> f64 {
        b.prob(0, obs)
    }

    #[test]
    fn closures_satisfy_the_emission_interface() {
        fn emit(state: usize, obs: &usize) -> f64 {
            if state == *obs {
                0.9
            } else {
                0.1
            }
        }
        assert!((generic_emission_score(&emit, &0) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn closures_satisfy_the_duration_interface() {
        fn pd(d: usize) -> f64 {
            match d {
                1 => 0.25,
                2 => 0.75,
                _ => 0.0,
            }
        }
        let model: &dyn DurationModel = &pd;
        assert!((model.prob(2) - 0.75).abs() < 1e-12);
        assert_eq!(model.prob(7), 0.0);
    }

    // -----------------------------------------------------------------------
    // StateLabels
    // -----------------------------------------------------------------------

    #[test]
    fn state_labels_round_trip() {
        let labels = StateLabels::new(vec!["exon", "intron", "intergenic"]).unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.index_of(&"intron"), Some(1));
        assert_eq!(labels.label(2), Some(&"intergenic"));
        assert_eq!(labels.label(3), None);
        assert_eq!(
            labels.relabel(&[2, 0, 0]).unwrap(),
            vec!["intergenic", "exon", "exon"]
        );
    }

    #[test]
    fn state_labels_reject_duplicates_and_empty() {
        assert!(StateLabels::new(vec!["a", "b", "a"]).is_err());
        assert!(StateLabels::<&str>::new(vec![]).is_err());
    }

    #[test]
    fn relabel_rejects_out_of_range_indices() {
        let labels = StateLabels::new(vec!['x', 'y']).unwrap();
        assert!(labels.relabel(&[0, 2]).is_err());
    }

    // -----------------------------------------------------------------------
    // Validation helpers
    // -----------------------------------------------------------------------

    #[test]
    fn distribution_validation() {
        assert!(validate_distribution("mu", &[0.5, 0.5], 2).is_ok());
        assert!(validate_distribution("mu", &[0.5, 0.5], 3).is_err());
        assert!(validate_distribution("mu", &[0.5, 0.4], 2).is_err());
    }

    #[test]
    fn transition_validation() {
        assert!(validate_transition(&[0.9, 0.1, 0.2, 0.8], 2).is_ok());
        assert!(validate_transition(&[0.9, 0.1, 0.2], 2).is_err());
        assert!(validate_transition(&[0.9, 0.2, 0.2, 0.8], 2).is_err());
    }
}
