//! Error types for hash probing runs.
//!
//! Only conditions that invalidate a whole run are represented here. A single
//! trial that fails while hashing is logged and counted by the sampler, never
//! surfaced as an error.

use thiserror::Error;

/// The random-byte source could not deliver entropy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("entropy source failed: {0}")]
pub struct EntropyError(pub String);

impl From<getrandom::Error> for EntropyError {
    fn from(err: getrandom::Error) -> Self {
        Self(err.to_string())
    }
}

/// Fatal error that aborts a sampling run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// No entropy, no meaningful trials.
    #[error(transparent)]
    Entropy(#[from] EntropyError),

    /// Two digests produced within one run differ in length.
    #[error("digest length mismatch: expected {expected} bytes, got {actual}")]
    DigestLengthMismatch { expected: usize, actual: usize },

    /// A worker thread died outside the per-trial recovery boundary.
    #[error("sampler worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    /// Parameters that cannot describe a valid test.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
