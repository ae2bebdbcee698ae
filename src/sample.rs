//! Weighted categorical sampling.
//!
//! [`CategoricalSampler`] draws a value from a parallel value vector with the
//! probabilities of a validated probability vector, via inverse-CDF sampling
//! against a seeded PRNG. It is the leaf dependency of the sequence
//! generators; the decoders never sample.

use crate::error::{MarkovError, Result};
use crate::model::{DurationLaw, DurationModel, PROB_TOLERANCE};

// ---------------------------------------------------------------------------
// PRNG
// ---------------------------------------------------------------------------

/// Simple LCG PRNG (linear congruential generator).
///
/// Uses the same constants as glibc: multiplier 6364136223846793005,
/// increment 1442695040888963407. Seeded for reproducibility.
#[derive(Debug, Clone)]
pub struct LcgRng {
    state: u64,
}

impl LcgRng {
    /// Create a new generator from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(1), // avoid zero state
        }
    }

    /// Next raw 64-bit value.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Uniform draw in the half-open interval `(0, 1]`.
    ///
    /// The top 53 bits give an integer in `[0, 2^53)`; shifting it up by one
    /// before dividing excludes 0 and includes 1, matching the interval the
    /// inverse-CDF selection expects.
    pub fn next_unit(&mut self) -> f64 {
        (((self.next_u64() >> 11) + 1) as f64) / (1u64 << 53) as f64
    }
}

// ---------------------------------------------------------------------------
// CategoricalSampler
// ---------------------------------------------------------------------------

/// Draws values from a finite set according to a categorical distribution.
///
/// The cumulative vector is `[0, p0, p0+p1, …, 1]`; a uniform draw
/// `u ∈ (0, 1]` selects the unique index `i` with `cum[i] < u <= cum[i+1]`.
/// The final cumulative entry is pinned to exactly 1.0 so float drift in the
/// partial sums can never leave a draw unmatched.
#[derive(Debug, Clone)]
pub struct CategoricalSampler<T> {
    probs: Vec<f64>,
    cum: Vec<f64>,
    values: Vec<T>,
    rng: LcgRng,
}

impl<T: Clone> CategoricalSampler<T> {
    /// Create a sampler from a probability vector and a parallel value vector.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the vectors are empty or of different lengths
    /// - any probability is negative
    /// - the probabilities do not sum to approximately 1.0 (tolerance 1e-6)
    pub fn new(probs: Vec<f64>, values: Vec<T>, seed: u64) -> Result<Self> {
        if probs.is_empty() {
            return Err(MarkovError::InvalidInput(
                "probability vector is empty".into(),
            ));
        }
        if probs.len() != values.len() {
            return Err(MarkovError::InvalidInput(format!(
                "probability vector length {} != value vector length {}",
                probs.len(),
                values.len()
            )));
        }
        if let Some(p) = probs.iter().find(|&&p| p < 0.0) {
            return Err(MarkovError::InvalidInput(format!(
                "negative probability {p}"
            )));
        }
        let sum: f64 = probs.iter().sum();
        if (sum - 1.0).abs() > PROB_TOLERANCE {
            return Err(MarkovError::InvalidInput(format!(
                "probabilities sum to {sum}, expected ~1.0"
            )));
        }

        let mut cum = Vec::with_capacity(probs.len() + 1);
        cum.push(0.0);
        let mut acc = 0.0;
        for &p in &probs {
            acc += p;
            cum.push(acc);
        }
        // Pin the last entry so u = 1.0 always lands inside the final
        // nonempty interval.
        if let Some(last) = cum.last_mut() {
            *last = 1.0;
        }

        Ok(Self {
            probs,
            cum,
            values,
            rng: LcgRng::new(seed),
        })
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.probs.len()
    }

    /// Whether the sampler has no categories (never true once constructed).
    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    /// Probability of the category at `index`.
    pub fn prob(&self, index: usize) -> f64 {
        self.probs[index]
    }

    /// Draw one value.
    pub fn draw(&mut self) -> T {
        let i = self.draw_index();
        self.values[i].clone()
    }

    /// Draw one category index.
    pub fn draw_index(&mut self) -> usize {
        let u = self.rng.next_unit();
        for i in 0..self.probs.len() {
            if self.cum[i] < u && u <= self.cum[i + 1] {
                return i;
            }
        }
        // Unreachable when cum covers (0, 1]; kept as a safe fallback.
        self.probs.len() - 1
    }
}

// ---------------------------------------------------------------------------
// CategoricalDuration
// ---------------------------------------------------------------------------

/// Categorical duration distribution over a finite set of durations.
///
/// Serves both sides of the system: it implements [`DurationLaw`] for
/// generation (sample a duration), and [`as_model`](Self::as_model) yields
/// the decoder-side [`DurationModel`] view (mass of a hypothesized duration;
/// 0.0 outside the support).
#[derive(Debug, Clone)]
pub struct CategoricalDuration {
    inner: CategoricalSampler<usize>,
}

impl CategoricalDuration {
    /// Create a duration distribution from probabilities over `durations`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid probability vectors (see
    /// [`CategoricalSampler::new`]) or durations of 0.
    pub fn new(probs: Vec<f64>, durations: Vec<usize>, seed: u64) -> Result<Self> {
        if durations.contains(&0) {
            return Err(MarkovError::InvalidInput(
                "durations must be >= 1".into(),
            ));
        }
        Ok(Self {
            inner: CategoricalSampler::new(probs, durations, seed)?,
        })
    }

    /// Mass of exactly `duration`; 0.0 outside the support.
    pub fn prob_of(&self, duration: usize) -> f64 {
        self.inner
            .values
            .iter()
            .position(|&d| d == duration)
            .map_or(0.0, |i| self.inner.probs[i])
    }

    /// Decoder-side view of this distribution.
    pub fn as_model(&self) -> impl DurationModel + '_ {
        move |d: usize| self.prob_of(d)
    }
}

impl DurationLaw for CategoricalDuration {
    fn sample(&mut self) -> usize {
        self.inner.draw()
    }

    fn prob(&self, duration: usize) -> f64 {
        self.prob_of(duration)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
