//! Hidden Markov Model Viterbi decoding.
//!
//! Computes the single most probable hidden-state sequence explaining an
//! observation sequence, in log-space for numerical stability. Emission
//! likelihoods are supplied by the caller through [`EmissionModel`], so the
//! observation type stays opaque to the recursion.
//!
//! # Quick start
//!
//! ```
//! use semimarkov::HmmModel;
//!
//! // 2-state fair/loaded coin model
//! let model = HmmModel::new(
//!     2,
//!     vec![0.5, 0.5],
//!     vec![
//!         0.9, 0.1, // fair   -> fair, loaded
//!         0.2, 0.8, // loaded -> fair, loaded
//!     ],
//! )
//! .unwrap();
//!
//! // P(heads) = 0.5 for fair, 0.8 for loaded
//! fn emit(state: usize, obs: &usize) -> f64 {
//!     let p_heads = if state == 0 { 0.5 } else { 0.8 };
//!     if *obs == 0 { p_heads } else { 1.0 - p_heads }
//! }
//!
//! let obs = vec![0usize, 0, 1, 0, 0]; // H H T H H
//! let (path, score) = model.viterbi(&emit, &obs).unwrap();
//! assert_eq!(path.len(), obs.len());
//! assert!(score < 0.0);
//! ```

use log::debug;

use crate::error::{MarkovError, Result};
use crate::logspace::ln_prob;
use crate::model::{validate_distribution, validate_transition, EmissionModel};

/// A Hidden Markov Model: state count, initial distribution, and transition
/// matrix. Emissions are external (see [`EmissionModel`]).
///
/// Parameters are stored in probability space; decoding operates in
/// log-space.
#[derive(Debug, Clone)]
pub struct HmmModel {
    /// Number of hidden states.
    n_states: usize,
    /// Initial state probabilities mu[j] (length `n_states`).
    initial: Vec<f64>,
    /// Transition matrix A[i][j] = P(state_j | state_i), stored row-major
    /// as `Vec<f64>` of size `n_states * n_states`.
    transition: Vec<f64>,
}

impl HmmModel {
    /// Create a new HMM after validating dimensions and probability
    /// constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `n_states` is zero
    /// - `initial` is not a length-`n_states` distribution summing to ~1.0
    /// - `transition` is not `n_states x n_states` with every row summing
    ///   to ~1.0 (tolerance 1e-6)
    pub fn new(n_states: usize, initial: Vec<f64>, transition: Vec<f64>) -> Result<Self> {
        if n_states == 0 {
            return Err(MarkovError::InvalidInput("n_states must be > 0".into()));
        }
        validate_distribution("initial distribution", &initial, n_states)?;
        validate_transition(&transition, n_states)?;

        Ok(Self {
            n_states,
            initial,
            transition,
        })
    }

    /// Number of hidden states.
    pub fn n_states(&self) -> usize {
        self.n_states
    }

    #[inline]
    fn a(&self, from: usize, to: usize) -> f64 {
        self.transition[from * self.n_states + to]
    }

    /// Viterbi decoding: find the most likely state sequence.
    ///
    /// Returns `(path, log_probability)` where `path[t]` is the most likely
    /// state index at time `t` and `log_probability` is the log probability
    /// of that best path. Ties in the predecessor search break toward the
    /// lowest state index.
    ///
    /// A probability of exactly zero (structural transition zeros, emission
    /// zeros) contributes `-inf` to the search rather than an error. If every
    /// candidate at a cell is `-inf` the backpointer degrades to index 0 —
    /// an accepted degenerate-model behavior, not a decode failure.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty observation sequence.
    pub fn viterbi<O, B>(&self, emission: &B, observations: &[O]) -> Result<(Vec<usize>, f64)>
    where
        B: EmissionModel<O>,
    {
        if observations.is_empty() {
            return Err(MarkovError::InvalidInput(
                "observation sequence is empty".into(),
            ));
        }

        let n = self.n_states;
        let t_len = observations.len();

        let mut delta = vec![f64::NEG_INFINITY; t_len * n];
        let mut phi = vec![0usize; t_len * n];

        // Initialization: delta[0][j] = ln(mu[j]) + ln(b(j, o_0)).
        // phi has no meaningful entry at t = 0.
        for j in 0..n {
            delta[j] = ln_prob(self.initial[j]) + ln_prob(emission.prob(j, &observations[0]));
        }

        // Recursion
        for t in 1..t_len {
            for j in 0..n {
                let mut best_val = f64::NEG_INFINITY;
                let mut best_state = 0;
                for i in 0..n {
                    let candidate = ln_prob(self.a(i, j)) + delta[(t - 1) * n + i];
                    if candidate > best_val {
                        best_val = candidate;
                        best_state = i;
                    }
                }
                delta[t * n + j] =
                    best_val + ln_prob(emission.prob(j, &observations[t]));
                phi[t * n + j] = best_state;
            }
        }

        // Termination: best final state
        let mut best_final = 0usize;
        let mut best_score = f64::NEG_INFINITY;
        for j in 0..n {
            if delta[(t_len - 1) * n + j] > best_score {
                best_score = delta[(t_len - 1) * n + j];
                best_final = j;
            }
        }

        // Backtrack
        let mut path = vec![0usize; t_len];
        path[t_len - 1] = best_final;
        for t in (0..t_len - 1).rev() {
            path[t] = phi[(t + 1) * n + path[t + 1]];
        }

        debug!("viterbi: decoded {t_len} steps over {n} states, log-probability {best_score}");
        Ok((path, best_score))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
