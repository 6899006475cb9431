//! Repeated sampling and evaluation across hash functions.
//!
//! One [`Orchestrator`] drives both test kinds. A single run samples `N`
//! trials and judges them; a repeated run does that `R` times and reports the
//! pass rate together with the mean and standard deviation of the observed
//! z-scores. Under the null hypothesis the latter two should approach 0 and 1.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, error, info};
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::adapter::HashFactory;
use crate::error::{ProbeError, Result};
use crate::evaluator::{BitPredictionReport, Confidence, Evaluator, HammingReport, TestVerdict};
use crate::sampler::{Sampler, host_parallelism};
use crate::trial::{ByteSource, DEFAULT_INPUT_LEN, OsEntropy};

/// Which statistical probe to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Mean Hamming distance between digests of one-bit-apart inputs.
    Hamming,
    /// Per-bit bias over unrelated inputs.
    BitPrediction,
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hamming => write!(f, "hamming"),
            Self::BitPrediction => write!(f, "bit_prediction"),
        }
    }
}

impl FromStr for TestKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hamming" | "avalanche" => Ok(Self::Hamming),
            "bits" | "bit_prediction" | "bit-prediction" => Ok(Self::BitPrediction),
            other => Err(ProbeError::InvalidConfig(format!("unknown test kind '{other}'"))),
        }
    }
}

/// Result of a single run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestOutcome {
    Hamming(HammingReport),
    BitPrediction(BitPredictionReport),
}

impl TestOutcome {
    pub fn kind(&self) -> TestKind {
        match self {
            Self::Hamming(_) => TestKind::Hamming,
            Self::BitPrediction(_) => TestKind::BitPrediction,
        }
    }

    /// Headline verdict: the Hamming z-test, or the bit test's summary.
    pub fn verdict(&self) -> TestVerdict {
        match self {
            Self::Hamming(report) => report.verdict,
            Self::BitPrediction(report) => report.summary,
        }
    }

    pub fn failed_trials(&self) -> u64 {
        match self {
            Self::Hamming(report) => report.sample.failed_trials,
            Self::BitPrediction(report) => report.failed_trials,
        }
    }
}

/// Parameters for a test suite.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Trials per run (`N`).
    pub trials: u64,
    /// Independent runs per hash function (`R`).
    pub repetitions: usize,
    /// Random input length in bytes.
    pub input_len: usize,
    pub confidence: Confidence,
    /// Sampler worker threads.
    pub workers: usize,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            trials: 1000,
            repetitions: 10_000,
            input_len: DEFAULT_INPUT_LEN,
            confidence: Confidence::reference(),
            workers: host_parallelism(),
        }
    }
}

impl SuiteConfig {
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(ProbeError::InvalidConfig("trials must be at least 1".into()));
        }
        if self.repetitions == 0 {
            return Err(ProbeError::InvalidConfig("repetitions must be at least 1".into()));
        }
        if self.input_len == 0 {
            return Err(ProbeError::InvalidConfig("input length must be at least 1 byte".into()));
        }
        Ok(())
    }
}

/// Pass rate and z-score distribution of repeated runs for one hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub algorithm: String,
    pub kind: TestKind,
    pub trials: u64,
    pub repetitions: usize,
    pub passed: usize,
    /// `passed / repetitions`, in `[0, 1]`.
    pub pass_rate: f64,
    pub mean_z: f64,
    /// Sample standard deviation (`n - 1`); NaN for a single repetition.
    pub std_dev_z: f64,
    pub z_scores: Vec<f64>,
}

impl RunSummary {
    pub fn from_verdicts(
        algorithm: impl Into<String>,
        kind: TestKind,
        trials: u64,
        verdicts: &[TestVerdict],
    ) -> Self {
        let z_scores: Vec<f64> = verdicts.iter().map(|v| v.z_score).collect();
        let passed = verdicts.iter().filter(|v| v.passed).count();
        Self {
            algorithm: algorithm.into(),
            kind,
            trials,
            repetitions: verdicts.len(),
            passed,
            pass_rate: passed as f64 / verdicts.len() as f64,
            mean_z: z_scores.iter().mean(),
            std_dev_z: z_scores.iter().std_dev(),
            z_scores,
        }
    }
}

/// Outcome of a repeated run for one entry of a suite.
#[derive(Debug)]
pub struct SuiteEntry {
    pub algorithm: String,
    pub result: Result<RunSummary>,
}

/// Runs the sample-then-evaluate pipeline.
pub struct Orchestrator {
    config: SuiteConfig,
    sampler: Sampler,
    evaluator: Evaluator,
    source: Arc<dyn ByteSource>,
}

impl Orchestrator {
    pub fn new(config: SuiteConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sampler: Sampler::new(config.workers).with_input_len(config.input_len),
            evaluator: Evaluator::new(config.confidence),
            source: Arc::new(OsEntropy),
            config,
        })
    }

    /// Draw trial inputs from `source` instead of the OS CSPRNG.
    pub fn with_source(mut self, source: Arc<dyn ByteSource>) -> Self {
        self.source = source;
        self
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// One run of `N` trials. Trial count, input length and confidence come
    /// from the [`SuiteConfig`] the orchestrator was built with.
    pub fn run_test(&self, factory: &dyn HashFactory, kind: TestKind) -> Result<TestOutcome> {
        let source = self.source.as_ref();
        let outcome = match kind {
            TestKind::Hamming => {
                let sample = self.sampler.sample_hamming(factory, self.config.trials, source)?;
                TestOutcome::Hamming(self.evaluator.hamming(&sample))
            }
            TestKind::BitPrediction => {
                let sample = self.sampler.sample_bits(factory, self.config.trials, source)?;
                TestOutcome::BitPrediction(self.evaluator.bit_prediction(&sample))
            }
        };
        if outcome.failed_trials() > 0 {
            debug!(
                "{}: {} of {} trials recorded as zero after hashing failures",
                factory.name(),
                outcome.failed_trials(),
                self.config.trials
            );
        }
        Ok(outcome)
    }

    /// `R` independent runs, `R` being [`SuiteConfig::repetitions`]. The
    /// first fatal error abandons the rest.
    pub fn run_repeated(&self, factory: &dyn HashFactory, kind: TestKind) -> Result<RunSummary> {
        let mut verdicts = Vec::with_capacity(self.config.repetitions);
        for rep in 0..self.config.repetitions {
            let verdict = self.run_test(factory, kind)?.verdict();
            debug!(
                "{} {kind} run {rep}: z={:.4} passed={}",
                factory.name(),
                verdict.z_score,
                verdict.passed
            );
            verdicts.push(verdict);
        }

        let summary = RunSummary::from_verdicts(factory.name(), kind, self.config.trials, &verdicts);
        info!(
            "{} {kind}: {}/{} passed ({:.2}%), mean z={:.4}, std z={:.4}",
            summary.algorithm,
            summary.passed,
            summary.repetitions,
            summary.pass_rate * 100.0,
            summary.mean_z,
            summary.std_dev_z
        );
        Ok(summary)
    }

    /// Repeated runs for each hash in turn, each with its own summary.
    ///
    /// A fatal error ends only the affected hash's runs.
    pub fn run_suite(&self, factories: &[&dyn HashFactory], kind: TestKind) -> Vec<SuiteEntry> {
        factories
            .iter()
            .map(|factory| {
                let result = self.run_repeated(*factory, kind);
                if let Err(err) = &result {
                    error!("{} {kind}: suite aborted: {err}", factory.name());
                }
                SuiteEntry {
                    algorithm: factory.name().to_string(),
                    result,
                }
            })
            .collect()
    }
}
