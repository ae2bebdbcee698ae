//! Structured error types for the semimarkov crate.

use thiserror::Error;

/// Unified error type for model construction, generation, and decoding.
#[derive(Debug, Error)]
pub enum MarkovError {
    /// Invalid input (malformed model parameters, bad arguments)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Decode failure (internally inconsistent dynamic-programming tables)
    #[error("decode error: {0}")]
    Decode(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MarkovError>;
