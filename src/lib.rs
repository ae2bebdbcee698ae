//! Markov and semi-Markov sequence models: generation and Viterbi decoding.
//!
//! `semimarkov` decodes the most probable hidden-state sequence explaining an
//! observed sequence, under two generative models:
//!
//! - **HMM** ([`hmm`]) — states transition once per time step, observations
//!   are scored independently per step
//! - **Hidden semi-Markov model** ([`hsmm`]) — states persist for a random
//!   duration and a whole segment's observations are scored jointly
//!
//! Supporting pieces:
//!
//! - **Generation** ([`generate`]) — synthetic state/observation sequences
//!   for testing and validation
//! - **Sampling** ([`sample`]) — seeded weighted categorical draws
//! - **Evaluation** ([`evaluate`]) — decode-vs-truth mismatch rates
//! - **Log-space primitives** ([`logspace`]) — zero-safe logs and delta-table
//!   merging
//!
//! All decoding runs in natural-log space; exactly-zero probabilities become
//! `-inf` hypotheses instead of arithmetic errors. Decoders allocate their DP
//! tables per call and share no mutable state, so independent decodes can run
//! on separate threads without coordination.

pub mod error;
pub mod evaluate;
pub mod generate;
pub mod hmm;
pub mod hsmm;
pub mod logspace;
pub mod model;
pub mod sample;

pub use error::{MarkovError, Result};
pub use hmm::HmmModel;
pub use hsmm::{SemiMarkovModel, SemiViterbiPath};
pub use model::{
    DurationLaw, DurationModel, EmissionModel, ObservationLaw, SegmentEmissionModel, StateLabels,
};
pub use sample::{CategoricalDuration, CategoricalSampler};
