//! Synthetic sequence generation.
//!
//! Generators sample state/observation sequences from a model's transition,
//! initial, emission, and (for the semi-Markov case) duration laws. They
//! exist to produce test and validation data: the decoders consume only the
//! flat observation sequence, while the parallel true states and durations
//! are kept for external evaluation (see [`crate::evaluate`]).

use log::debug;

use crate::error::Result;
use crate::model::{validate_distribution, validate_transition, DurationLaw, ObservationLaw};
use crate::sample::CategoricalSampler;

/// Build one categorical sampler per transition-matrix row, plus one for the
/// initial distribution. Each row gets its own decorrelated seed.
fn transition_samplers(
    n_states: usize,
    transition: &[f64],
    seed: u64,
) -> Result<Vec<CategoricalSampler<usize>>> {
    let states: Vec<usize> = (0..n_states).collect();
    (0..n_states)
        .map(|i| {
            let row = transition[i * n_states..(i + 1) * n_states].to_vec();
            CategoricalSampler::new(row, states.clone(), seed.wrapping_add(i as u64 + 1))
        })
        .collect()
}

fn uniform_initial(n_states: usize) -> Vec<f64> {
    vec![1.0 / n_states as f64; n_states]
}

// ---------------------------------------------------------------------------
// HmmGenerator
// ---------------------------------------------------------------------------

/// Generates `(observation, state)` sequences from an HMM.
///
/// The generator keeps its current state between calls, so consecutive
/// [`generate`](Self::generate) calls continue the same chain.
pub struct HmmGenerator<L: ObservationLaw> {
    rows: Vec<CategoricalSampler<usize>>,
    law: L,
    state: usize,
}

impl<L: ObservationLaw> HmmGenerator<L> {
    /// Create a generator from a transition matrix, an optional initial
    /// distribution (uniform when omitted), an observation law, and a seed.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed transition matrix or initial
    /// distribution.
    pub fn new(
        n_states: usize,
        transition: Vec<f64>,
        initial: Option<Vec<f64>>,
        law: L,
        seed: u64,
    ) -> Result<Self> {
        validate_transition(&transition, n_states)?;
        let initial = initial.unwrap_or_else(|| uniform_initial(n_states));
        validate_distribution("initial distribution", &initial, n_states)?;

        let states: Vec<usize> = (0..n_states).collect();
        let mut mu = CategoricalSampler::new(initial, states, seed)?;
        let state = mu.draw();

        Ok(Self {
            rows: transition_samplers(n_states, &transition, seed)?,
            law,
            state,
        })
    }

    /// Generate `len` observations with their true states.
    pub fn generate(&mut self, len: usize) -> (Vec<L::Obs>, Vec<usize>) {
        let mut observations = Vec::with_capacity(len);
        let mut states = Vec::with_capacity(len);
        for _ in 0..len {
            states.push(self.state);
            observations.push(self.law.sample(self.state));
            self.state = self.rows[self.state].draw();
        }
        debug!("hmm-gen: generated {len} observations");
        (observations, states)
    }
}

// ---------------------------------------------------------------------------
// SemiMarkovGenerator
// ---------------------------------------------------------------------------

/// A generated semi-Markov sequence: segment-level and flattened views.
#[derive(Debug, Clone)]
pub struct SemiMarkovSequence<O> {
    /// Observations grouped per segment.
    pub segments: Vec<Vec<O>>,
    /// Flat observation sequence (what a decoder sees).
    pub observations: Vec<O>,
    /// True state per segment.
    pub states: Vec<usize>,
    /// True duration per segment.
    pub durations: Vec<usize>,
    /// True state per time step.
    pub step_states: Vec<usize>,
}

impl<O> SemiMarkovSequence<O> {
    /// Total number of time steps.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the sequence has no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Generates semi-Markov sequences: per visited state, a duration is drawn,
/// that many observations are emitted, then the chain transitions to a
/// different state.
pub struct SemiMarkovGenerator<L: ObservationLaw, D: DurationLaw> {
    rows: Vec<CategoricalSampler<usize>>,
    law: L,
    duration_law: D,
    state: usize,
}

impl<L, D> SemiMarkovGenerator<L, D>
where
    L: ObservationLaw,
    D: DurationLaw,
{
    /// Create a generator from a transition matrix, an optional initial
    /// distribution (uniform when omitted), observation and duration laws,
    /// and a seed.
    ///
    /// The transition matrix should carry no self-transition mass: a
    /// semi-Markov segment always hands off to a different state, and
    /// diagonal mass would fold consecutive same-state segments together.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed transition matrix or initial
    /// distribution.
    pub fn new(
        n_states: usize,
        transition: Vec<f64>,
        initial: Option<Vec<f64>>,
        law: L,
        duration_law: D,
        seed: u64,
    ) -> Result<Self> {
        validate_transition(&transition, n_states)?;
        let initial = initial.unwrap_or_else(|| uniform_initial(n_states));
        validate_distribution("initial distribution", &initial, n_states)?;

        let states: Vec<usize> = (0..n_states).collect();
        let mut mu = CategoricalSampler::new(initial, states, seed)?;
        let state = mu.draw();

        Ok(Self {
            rows: transition_samplers(n_states, &transition, seed)?,
            law,
            duration_law,
            state,
        })
    }

    /// Generate `n_segments` state visits.
    pub fn generate(&mut self, n_segments: usize) -> SemiMarkovSequence<L::Obs>
    where
        L::Obs: Clone,
    {
        let mut segments = Vec::with_capacity(n_segments);
        let mut observations = Vec::new();
        let mut states = Vec::with_capacity(n_segments);
        let mut durations = Vec::with_capacity(n_segments);
        let mut step_states = Vec::new();

        for _ in 0..n_segments {
            let duration = self.duration_law.sample();
            let mut segment = Vec::with_capacity(duration);
            for _ in 0..duration {
                let obs = self.law.sample(self.state);
                observations.push(obs.clone());
                segment.push(obs);
                step_states.push(self.state);
            }
            segments.push(segment);
            states.push(self.state);
            durations.push(duration);
            self.state = self.rows[self.state].draw();
        }

        debug!(
            "semi-gen: generated {n_segments} segments, {} observations",
            observations.len()
        );
        SemiMarkovSequence {
            segments,
            observations,
            states,
            durations,
            step_states,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
