//! Z-tests of aggregate samples against an ideal hash.
//!
//! Under the ideal-hash hypothesis every digest bit is an independent fair
//! coin, so for a `B`-bit digest:
//!
//! - the Hamming distance between `H(x)` and `H(x')` is `Binomial(B, 1/2)`,
//!   mean `B/2`, standard deviation `sqrt(B/4)`;
//! - each digest bit is `Bernoulli(1/2)`, mean `0.5`, standard deviation `0.5`.
//!
//! A sample mean over `N` trials is compared with
//! `z = (observed - expected) * sqrt(N) / std_dev` and passes iff
//! `|z| <= critical_value`.

use serde::Serialize;
use statrs::distribution::{Binomial, ContinuousCDF, DiscreteCDF, Normal};
use statrs::function::erf::{erf, erfc};
use std::f64::consts::SQRT_2;

use crate::error::{ProbeError, Result};
use crate::sampler::{BitSample, HammingSample};

/// Two-tailed confidence level and its normal critical value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Confidence {
    level: f64,
    critical_value: f64,
}

impl Default for Confidence {
    fn default() -> Self {
        Self::reference()
    }
}

impl Confidence {
    /// 95% with the conventional rounded critical value 1.96.
    pub fn reference() -> Self {
        Self {
            level: 0.95,
            critical_value: 1.96,
        }
    }

    /// Critical value derived from the inverse normal CDF, e.g. 0.99 -> 2.576.
    pub fn from_level(level: f64) -> Result<Self> {
        if !(level > 0.0 && level < 1.0) {
            return Err(ProbeError::InvalidConfig(format!(
                "confidence level must be in (0, 1), got {level}"
            )));
        }
        let normal = Normal::new(0.0, 1.0).expect("unit normal parameters are valid");
        Ok(Self {
            level,
            critical_value: normal.inverse_cdf(0.5 + level / 2.0),
        })
    }

    /// Confidence level implied by a two-tailed critical value.
    pub fn from_critical_value(critical_value: f64) -> Result<Self> {
        if !(critical_value.is_finite() && critical_value > 0.0) {
            return Err(ProbeError::InvalidConfig(format!(
                "critical value must be positive and finite, got {critical_value}"
            )));
        }
        Ok(Self {
            level: erf(critical_value / SQRT_2),
            critical_value,
        })
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn critical_value(&self) -> f64 {
        self.critical_value
    }

    pub fn accepts(&self, z_score: f64) -> bool {
        z_score.abs() <= self.critical_value
    }
}

/// Expected statistics of an ideal hash with a given digest width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IdealModel {
    pub bit_width: usize,
    pub hamming_mean: f64,
    pub hamming_std_dev: f64,
    pub bit_mean: f64,
    pub bit_std_dev: f64,
}

impl IdealModel {
    pub fn for_bit_width(bit_width: usize) -> Self {
        let b = bit_width as f64;
        Self {
            bit_width,
            hamming_mean: b / 2.0,
            hamming_std_dev: (b / 4.0).sqrt(),
            bit_mean: 0.5,
            bit_std_dev: 0.5,
        }
    }
}

/// Outcome of one z-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestVerdict {
    pub z_score: f64,
    /// Two-tailed normal p-value of `z_score`.
    pub p_value: f64,
    pub passed: bool,
}

impl TestVerdict {
    pub fn from_z(z_score: f64, confidence: &Confidence) -> Self {
        Self {
            z_score,
            p_value: erfc(z_score.abs() / SQRT_2),
            passed: confidence.accepts(z_score),
        }
    }
}

/// Z-test of a sample mean over `n` observations.
///
/// # Panics
/// Panics if `n == 0`.
pub fn z_test(observed: f64, expected: f64, std_dev: f64, n: u64, confidence: &Confidence) -> TestVerdict {
    assert!(n > 0, "z-test over zero observations");
    let z = (observed - expected) * (n as f64).sqrt() / std_dev;
    TestVerdict::from_z(z, confidence)
}

/// Probability that one ideal digest bit passes its z-test over `trials`
/// digests.
///
/// The count of ones is `Binomial(N, 1/2)`, so only whole counts fall inside
/// `|z| <= c` and the accepted mass is not exactly the confidence level
/// (about 0.946 at N = 1000, c = 1.96).
pub fn bit_acceptance_probability(trials: u64, confidence: &Confidence) -> f64 {
    assert!(trials > 0, "acceptance probability over zero trials");
    let n = trials as f64;
    // Same arithmetic as the per-bit z-test so boundary counts agree.
    let accepts = |k: u64| confidence.accepts((k as f64 / n - 0.5) * n.sqrt() / 0.5);

    let half_width = confidence.critical_value * n.sqrt() / 2.0;
    let mut lo = (n / 2.0 - half_width).ceil().max(0.0) as u64;
    let mut hi = ((n / 2.0 + half_width).floor().min(n) as u64).min(trials);
    while lo > 0 && accepts(lo - 1) {
        lo -= 1;
    }
    while lo <= hi && !accepts(lo) {
        lo += 1;
    }
    while hi < trials && accepts(hi + 1) {
        hi += 1;
    }
    while hi >= lo && !accepts(hi) {
        if hi == 0 {
            break;
        }
        hi -= 1;
    }
    if lo > hi || !accepts(lo) {
        return 0.0;
    }

    let counts = Binomial::new(0.5, trials).expect("fair-coin binomial parameters are valid");
    let below = if lo == 0 { 0.0 } else { counts.cdf(lo - 1) };
    (counts.cdf(hi) - below).clamp(0.0, 1.0)
}

/// Hamming test result with the model it was judged against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HammingReport {
    pub sample: HammingSample,
    pub model: IdealModel,
    pub verdict: TestVerdict,
}

/// Bit-prediction result: one verdict per digest bit plus a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitPredictionReport {
    pub trials: u64,
    pub failed_trials: u64,
    pub bits: Vec<TestVerdict>,
    pub passed_bits: usize,
    /// Chance that a single ideal bit passes, see [`bit_acceptance_probability`].
    pub bit_pass_probability: f64,
    /// Pass count compared with its `Binomial(B, bit_pass_probability)`
    /// expectation.
    pub summary: TestVerdict,
}

impl BitPredictionReport {
    pub fn bit_width(&self) -> usize {
        self.bits.len()
    }

    pub fn pass_fraction(&self) -> f64 {
        self.passed_bits as f64 / self.bits.len() as f64
    }

    /// Positions whose bias exceeds the critical value.
    pub fn failing_bits(&self) -> Vec<usize> {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.passed)
            .map(|(k, _)| k)
            .collect()
    }
}

/// Judges aggregate samples at a fixed confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    confidence: Confidence,
}

impl Evaluator {
    pub fn new(confidence: Confidence) -> Self {
        Self { confidence }
    }

    pub fn confidence(&self) -> &Confidence {
        &self.confidence
    }

    pub fn hamming(&self, sample: &HammingSample) -> HammingReport {
        let model = IdealModel::for_bit_width(sample.bit_width);
        let verdict = z_test(
            sample.mean_distance,
            model.hamming_mean,
            model.hamming_std_dev,
            sample.trials,
            &self.confidence,
        );
        HammingReport {
            sample: sample.clone(),
            model,
            verdict,
        }
    }

    pub fn bit_prediction(&self, sample: &BitSample) -> BitPredictionReport {
        let model = IdealModel::for_bit_width(sample.bit_width());
        let bits: Vec<TestVerdict> = sample
            .probabilities
            .iter()
            .map(|&p| z_test(p, model.bit_mean, model.bit_std_dev, sample.trials, &self.confidence))
            .collect();
        let passed_bits = bits.iter().filter(|v| v.passed).count();

        let width = bits.len() as f64;
        let p = bit_acceptance_probability(sample.trials, &self.confidence);
        let deviation = passed_bits as f64 - width * p;
        let spread = (width * p * (1.0 - p)).sqrt();
        let z = if spread > 0.0 {
            deviation / spread
        } else if deviation == 0.0 {
            0.0
        } else {
            deviation.signum() * f64::INFINITY
        };

        BitPredictionReport {
            trials: sample.trials,
            failed_trials: sample.failed_trials,
            bits,
            passed_bits,
            bit_pass_probability: p,
            summary: TestVerdict::from_z(z, &self.confidence),
        }
    }
}
