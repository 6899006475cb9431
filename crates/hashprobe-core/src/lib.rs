//! # hashprobe-core
//!
//! **Does your hash function behave like a random oracle?**
//!
//! `hashprobe-core` samples a hash function many times in parallel and checks
//! two properties an ideal hash must have:
//!
//! - **Avalanche**: flipping one input bit flips about half of the digest bits.
//!   Measured as the mean Hamming distance between `H(x)` and `H(x')`.
//! - **No bit bias**: every digest bit is 1 with probability one half.
//!   Measured per bit position over unrelated random inputs.
//!
//! Both are judged with a two-tailed z-test against the binomial model of an
//! ideal hash.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hashprobe_core::{HashAlgorithm, Orchestrator, SuiteConfig, TestKind};
//!
//! let orchestrator = Orchestrator::new(SuiteConfig {
//!     repetitions: 100,
//!     ..SuiteConfig::default()
//! })
//! .unwrap();
//!
//! let summary = orchestrator
//!     .run_repeated(&HashAlgorithm::Sha256, TestKind::Hamming)
//!     .unwrap();
//! println!(
//!     "{}: {:.1}% passed, mean z {:.3}",
//!     summary.algorithm,
//!     summary.pass_rate * 100.0,
//!     summary.mean_z
//! );
//! ```
//!
//! ## Architecture
//!
//! Orchestrator → Sampler (workers × [Trial generator + Hash adapter]) →
//! aggregate sample → Evaluator → verdict → run summary
//!
//! Every hash is used through the [`HashAdapter`] trait and created per worker
//! by a [`HashFactory`], so nothing downstream depends on the concrete
//! algorithm.

pub mod adapter;
pub mod error;
pub mod evaluator;
pub mod orchestrator;
pub mod sampler;
pub mod trial;

pub use adapter::{
    Blake3Adapter, DigestAdapter, FnFactory, HashAdapter, HashAlgorithm, HashFactory,
};
pub use error::{EntropyError, ProbeError, Result};
pub use evaluator::{
    BitPredictionReport, Confidence, Evaluator, HammingReport, IdealModel, TestVerdict,
    bit_acceptance_probability, z_test,
};
pub use orchestrator::{Orchestrator, RunSummary, SuiteConfig, SuiteEntry, TestKind, TestOutcome};
pub use sampler::{
    Accumulator, BitCountAccumulator, BitSample, HammingAccumulator, HammingSample, Sampler,
    TrialQueue, host_parallelism, merge_partials,
};
pub use trial::{ByteSource, DEFAULT_INPUT_LEN, OsEntropy, TrialGenerator, flip_random_bit};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
