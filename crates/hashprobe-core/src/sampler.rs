//! Parallel trial sampling.
//!
//! Architecture:
//! 1. A [`TrialQueue`] hands out trial indices `0..N` and closes once exhausted
//! 2. One worker per execution unit, each with a private adapter and accumulator
//! 3. Workers drain the queue and return their accumulator through the join handle
//! 4. Joining every handle is the completion barrier; only then are partials merged
//!
//! Nothing is shared between workers in the per-trial loop except the queue
//! cursor (atomic) and the byte source (`Sync`).

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use log::{debug, error, warn};
use serde::Serialize;

use crate::adapter::{HashAdapter, HashFactory};
use crate::error::{ProbeError, Result};
use crate::trial::{ByteSource, DEFAULT_INPUT_LEN, TrialGenerator, hamming_distance};

// ---------------------------------------------------------------------------
// Job source
// ---------------------------------------------------------------------------

/// Bounded, lock-free source of trial indices.
///
/// Yields every index in `0..total` exactly once across all callers, then
/// reports closure. [`close`](Self::close) ends emission early.
#[derive(Debug)]
pub struct TrialQueue {
    cursor: AtomicU64,
    total: u64,
    closed: AtomicBool,
}

impl TrialQueue {
    pub fn new(total: u64) -> Self {
        Self {
            cursor: AtomicU64::new(0),
            total,
            closed: AtomicBool::new(false),
        }
    }

    /// Next unclaimed trial index, or `None` once the queue is closed.
    pub fn next(&self) -> Option<u64> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        if index < self.total {
            Some(index)
        } else {
            self.closed.store(true, Ordering::Release);
            None
        }
    }

    /// Stop handing out indices.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Partial accumulators
// ---------------------------------------------------------------------------

/// Per-worker running statistics that can be folded together.
///
/// `merge` must be commutative and associative.
pub trait Accumulator: Send {
    /// Trials processed, including fail-soft ones.
    fn trials(&self) -> u64;

    /// Trials that contributed zero because hashing failed.
    fn failed_trials(&self) -> u64;

    /// Digest width the partial was built for.
    fn bit_width(&self) -> usize;

    /// # Panics
    /// Panics if the two partials have different bit widths.
    fn merge(&mut self, other: Self)
    where
        Self: Sized;
}

/// Running Hamming-distance sum for one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HammingAccumulator {
    pub bit_width: usize,
    pub distance_sum: u64,
    pub trials: u64,
    pub failed: u64,
}

impl HammingAccumulator {
    pub fn new(bit_width: usize) -> Self {
        Self {
            bit_width,
            distance_sum: 0,
            trials: 0,
            failed: 0,
        }
    }

    pub fn record(&mut self, distance: u32) {
        self.distance_sum += u64::from(distance);
        self.trials += 1;
    }

    /// Count a trial whose hashing failed as a zero distance.
    pub fn record_failure(&mut self) {
        self.trials += 1;
        self.failed += 1;
    }

    /// Mean distance over all processed trials.
    ///
    /// # Panics
    /// Panics if no trial was processed.
    pub fn into_sample(self) -> HammingSample {
        assert!(self.trials > 0, "hamming sample over zero trials");
        HammingSample {
            mean_distance: self.distance_sum as f64 / self.trials as f64,
            trials: self.trials,
            bit_width: self.bit_width,
            failed_trials: self.failed,
        }
    }
}

impl Accumulator for HammingAccumulator {
    fn trials(&self) -> u64 {
        self.trials
    }

    fn failed_trials(&self) -> u64 {
        self.failed
    }

    fn bit_width(&self) -> usize {
        self.bit_width
    }

    fn merge(&mut self, other: Self) {
        assert_eq!(self.bit_width, other.bit_width, "merging different digest widths");
        self.distance_sum += other.distance_sum;
        self.trials += other.trials;
        self.failed += other.failed;
    }
}

/// Per-bit-position count of ones for one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitCountAccumulator {
    pub counts: Vec<u64>,
    pub trials: u64,
    pub failed: u64,
}

impl BitCountAccumulator {
    pub fn new(bit_width: usize) -> Self {
        Self {
            counts: vec![0; bit_width],
            trials: 0,
            failed: 0,
        }
    }

    /// Add one digest. Position `8*i + j` is bit `j` (LSB first) of byte `i`.
    pub fn record(&mut self, digest: &[u8]) {
        debug_assert_eq!(digest.len() * 8, self.counts.len());
        for (i, &byte) in digest.iter().enumerate() {
            for j in 0..8 {
                if byte & (1 << j) != 0 {
                    self.counts[8 * i + j] += 1;
                }
            }
        }
        self.trials += 1;
    }

    pub fn record_failure(&mut self) {
        self.trials += 1;
        self.failed += 1;
    }

    /// # Panics
    /// Panics if no trial was processed.
    pub fn into_sample(self) -> BitSample {
        assert!(self.trials > 0, "bit sample over zero trials");
        let n = self.trials as f64;
        BitSample {
            probabilities: self.counts.iter().map(|&c| c as f64 / n).collect(),
            trials: self.trials,
            failed_trials: self.failed,
        }
    }
}

impl Accumulator for BitCountAccumulator {
    fn trials(&self) -> u64 {
        self.trials
    }

    fn failed_trials(&self) -> u64 {
        self.failed
    }

    fn bit_width(&self) -> usize {
        self.counts.len()
    }

    fn merge(&mut self, other: Self) {
        assert_eq!(
            self.counts.len(),
            other.counts.len(),
            "merging different digest widths"
        );
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts) {
            *mine += theirs;
        }
        self.trials += other.trials;
        self.failed += other.failed;
    }
}

/// Fold partial accumulators into one. `None` for an empty input.
pub fn merge_partials<A: Accumulator>(partials: impl IntoIterator<Item = A>) -> Option<A> {
    partials.into_iter().reduce(|mut acc, next| {
        acc.merge(next);
        acc
    })
}

// ---------------------------------------------------------------------------
// Aggregate samples
// ---------------------------------------------------------------------------

/// Mean Hamming distance between digests of one-bit-apart inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HammingSample {
    pub mean_distance: f64,
    pub trials: u64,
    /// Digest width in bits.
    pub bit_width: usize,
    /// Trials recorded as zero distance after a hashing failure.
    pub failed_trials: u64,
}

/// Empirical probability of each digest bit being 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitSample {
    pub probabilities: Vec<f64>,
    pub trials: u64,
    pub failed_trials: u64,
}

impl BitSample {
    pub fn bit_width(&self) -> usize {
        self.probabilities.len()
    }
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

/// Fixed-size worker pool that turns N trials into an aggregate sample.
#[derive(Debug, Clone)]
pub struct Sampler {
    workers: usize,
    input_len: usize,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(host_parallelism())
    }
}

/// Number of execution units on this host (at least 1).
pub fn host_parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Sampler {
    /// Pool of `workers` threads (clamped to at least 1).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            input_len: DEFAULT_INPUT_LEN,
        }
    }

    /// Length of each random trial input in bytes.
    pub fn with_input_len(mut self, input_len: usize) -> Self {
        self.input_len = input_len;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// Hamming distances between `H(x)` and `H(x')`, `x'` being `x` with one
    /// bit flipped, averaged over `trials` random inputs.
    pub fn sample_hamming(
        &self,
        factory: &dyn HashFactory,
        trials: u64,
        source: &dyn ByteSource,
    ) -> Result<HammingSample> {
        let input_len = self.input_len;
        let partials = self.fan_out(
            factory,
            trials,
            |adapter| HammingAccumulator::new(adapter.bit_width()),
            |adapter, acc, index| {
                let generator = TrialGenerator::new(source);
                let original = generator.generate(input_len)?;
                let mutated = generator.mutate(&original);

                let digests = catch_unwind(AssertUnwindSafe(|| {
                    let first = digest_of(&mut *adapter, &original);
                    let second = digest_of(&mut *adapter, &mutated);
                    (first, second)
                }));
                match digests {
                    Ok((first, second)) => {
                        check_len(adapter.output_len(), &first)?;
                        acc.record(hamming_distance(&first, &second)?);
                    }
                    Err(_) => {
                        warn!(
                            "{}: trial {index} failed while hashing; recording zero distance",
                            factory.name()
                        );
                        recover(adapter);
                        acc.record_failure();
                    }
                }
                Ok(())
            },
        )?;
        merge_partials(partials)
            .map(HammingAccumulator::into_sample)
            .ok_or_else(|| ProbeError::InvalidConfig("no trials were sampled".into()))
    }

    /// Per-bit probability of a digest bit being 1 over `trials` unrelated
    /// random inputs.
    pub fn sample_bits(
        &self,
        factory: &dyn HashFactory,
        trials: u64,
        source: &dyn ByteSource,
    ) -> Result<BitSample> {
        let input_len = self.input_len;
        let partials = self.fan_out(
            factory,
            trials,
            |adapter| BitCountAccumulator::new(adapter.bit_width()),
            |adapter, acc, index| {
                let input = TrialGenerator::new(source).generate(input_len)?;

                match catch_unwind(AssertUnwindSafe(|| digest_of(&mut *adapter, &input))) {
                    Ok(digest) => {
                        check_len(adapter.output_len(), &digest)?;
                        acc.record(&digest);
                    }
                    Err(_) => {
                        warn!(
                            "{}: trial {index} failed while hashing; recording zero bits",
                            factory.name()
                        );
                        recover(adapter);
                        acc.record_failure();
                    }
                }
                Ok(())
            },
        )?;
        merge_partials(partials)
            .map(BitCountAccumulator::into_sample)
            .ok_or_else(|| ProbeError::InvalidConfig("no trials were sampled".into()))
    }

    /// Run `step` once per trial index across the pool and return each
    /// worker's finished accumulator.
    fn fan_out<A, I, S>(
        &self,
        factory: &dyn HashFactory,
        trials: u64,
        init: I,
        step: S,
    ) -> Result<Vec<A>>
    where
        A: Accumulator,
        I: Fn(&dyn HashAdapter) -> A + Sync,
        S: Fn(&mut dyn HashAdapter, &mut A, u64) -> Result<()> + Sync,
    {
        if trials == 0 {
            return Err(ProbeError::InvalidConfig("trial count must be at least 1".into()));
        }
        if self.input_len == 0 {
            return Err(ProbeError::InvalidConfig("input length must be at least 1 byte".into()));
        }

        let workers = usize::try_from(trials).map_or(self.workers, |t| self.workers.min(t));
        let queue = TrialQueue::new(trials);
        debug!(
            "{}: sampling {trials} trials on {workers} workers",
            factory.name()
        );

        thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let queue = &queue;
                    let init = &init;
                    let step = &step;
                    s.spawn(move || -> Result<A> {
                        let mut adapter = factory.create();
                        if adapter.output_len() == 0 {
                            queue.close();
                            return Err(ProbeError::InvalidConfig(format!(
                                "{}: adapter reports a zero-length digest",
                                factory.name()
                            )));
                        }
                        let mut acc = init(&*adapter);
                        while let Some(index) = queue.next() {
                            if let Err(err) = step(&mut *adapter, &mut acc, index) {
                                queue.close();
                                return Err(err);
                            }
                        }
                        debug!(
                            "worker {worker} done: {} trials ({} failed)",
                            acc.trials(),
                            acc.failed_trials()
                        );
                        Ok(acc)
                    })
                })
                .collect();

            let mut partials = Vec::with_capacity(workers);
            let mut fatal = None;
            for (worker, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(Ok(acc)) => partials.push(acc),
                    Ok(Err(err)) => {
                        fatal.get_or_insert(err);
                    }
                    Err(_) => {
                        queue.close();
                        fatal.get_or_insert(ProbeError::WorkerPanicked { worker });
                    }
                }
            }

            let result = match fatal {
                Some(err) => Err(err),
                None => check_widths(&partials).map(|()| partials),
            };
            if let Err(err) = &result {
                error!("{}: sampling aborted: {err}", factory.name());
            }
            result
        })
    }
}

fn digest_of(adapter: &mut dyn HashAdapter, data: &[u8]) -> Vec<u8> {
    adapter.write(data);
    let digest = adapter.sum();
    adapter.reset();
    digest
}

fn check_len(expected: usize, digest: &[u8]) -> Result<()> {
    if digest.len() == expected {
        Ok(())
    } else {
        Err(ProbeError::DigestLengthMismatch {
            expected,
            actual: digest.len(),
        })
    }
}

/// Every worker's adapter must report the same digest width before merging.
fn check_widths<A: Accumulator>(partials: &[A]) -> Result<()> {
    let Some(first) = partials.first() else {
        return Ok(());
    };
    match partials.iter().find(|p| p.bit_width() != first.bit_width()) {
        Some(other) => Err(ProbeError::DigestLengthMismatch {
            expected: first.bit_width() / 8,
            actual: other.bit_width() / 8,
        }),
        None => Ok(()),
    }
}

/// Best-effort reset after a failed trial so the next one starts clean.
fn recover(adapter: &mut dyn HashAdapter) {
    let _ = catch_unwind(AssertUnwindSafe(|| adapter.reset()));
}
