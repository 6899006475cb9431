//! Integration tests for hashprobe-core.
//!
//! These tests verify the full pipeline:
//! factory → parallel sampler → evaluator → orchestrator summary.

use std::sync::Arc;

use hashprobe_core::adapter::simulated::{IdealOracle, StuckBit};
use hashprobe_core::{
    Confidence, Evaluator, FnFactory, HashAdapter, HashAlgorithm, HashFactory, OsEntropy,
    Orchestrator, ProbeError, Sampler, SuiteConfig, TestKind, TestOutcome,
};

fn quick_config(trials: u64, repetitions: usize) -> SuiteConfig {
    SuiteConfig {
        trials,
        repetitions,
        ..SuiteConfig::default()
    }
}

#[test]
fn builtin_hashes_pass_a_single_hamming_run_mostly() {
    // A correct hash fails a single 95% run 5% of the time; three tries
    // make a spurious failure of this test ~1e-4.
    let orch = Orchestrator::new(quick_config(2000, 1)).unwrap();
    for algo in HashAlgorithm::ALL {
        let passed = (0..3).any(|_| {
            orch.run_test(&algo, TestKind::Hamming)
                .unwrap()
                .verdict()
                .passed
        });
        assert!(passed, "{algo} failed three Hamming runs in a row");
    }
}

#[test]
fn builtin_hashes_have_no_gross_bit_bias() {
    let orch = Orchestrator::new(quick_config(5000, 1)).unwrap();
    for algo in HashAlgorithm::ALL {
        match orch.run_test(&algo, TestKind::BitPrediction).unwrap() {
            TestOutcome::BitPrediction(report) => {
                assert_eq!(report.trials, 5000);
                // Expect ~243 of 256 bits to pass at 95%.
                assert!(
                    report.passed_bits >= 225,
                    "{algo}: only {} bits passed",
                    report.passed_bits
                );
                assert!(report.bits.iter().all(|v| v.z_score.abs() < 6.0));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}

#[test]
fn stuck_bit_is_flagged_in_real_hash() {
    let factory = FnFactory::new("sha256+stuck", || {
        Box::new(StuckBit::new(HashAlgorithm::Sha256.create(), 0)) as Box<dyn HashAdapter>
    });
    let sample = Sampler::default().sample_bits(&factory, 10_000, &OsEntropy).unwrap();
    let report = Evaluator::default().bit_prediction(&sample);
    assert!((report.bits[0].z_score - 100.0).abs() < 1e-9);
    assert!(report.failing_bits().contains(&0));
}

#[test]
fn explicit_confidence_changes_critical_value() {
    let config = SuiteConfig {
        confidence: Confidence::from_level(0.999).unwrap(),
        ..quick_config(500, 1)
    };
    let orch = Orchestrator::new(config).unwrap();
    assert!((orch.config().confidence.critical_value() - 3.2905).abs() < 1e-3);
    let outcome = orch.run_test(&HashAlgorithm::Blake3, TestKind::Hamming).unwrap();
    assert!(outcome.verdict().p_value > 0.0);
}

#[test]
fn suite_reports_each_hash_separately() {
    let orch = Orchestrator::new(quick_config(200, 10)).unwrap();
    let factories: Vec<&dyn HashFactory> = HashAlgorithm::ALL
        .iter()
        .map(|a| a as &dyn HashFactory)
        .collect();
    let entries = orch.run_suite(&factories, TestKind::BitPrediction);
    let names: Vec<_> = entries.iter().map(|e| e.algorithm.as_str()).collect();
    assert_eq!(names, ["sha256", "sha3-256", "blake3"]);
    for entry in &entries {
        let summary = entry.result.as_ref().unwrap();
        assert_eq!(summary.repetitions, 10);
        assert_eq!(summary.kind, TestKind::BitPrediction);
    }
}

#[test]
fn single_worker_and_many_workers_agree_on_counts() {
    for workers in [1, 16] {
        let sample = Sampler::new(workers)
            .sample_hamming(&HashAlgorithm::Sha256, 333, &OsEntropy)
            .unwrap();
        assert_eq!(sample.trials, 333);
    }
}

#[test]
fn summary_serializes_to_json() {
    let orch = Orchestrator::new(quick_config(100, 3)).unwrap();
    let summary = orch
        .run_repeated(&HashAlgorithm::Sha256, TestKind::Hamming)
        .unwrap();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["algorithm"], "sha256");
    assert_eq!(json["kind"], "hamming");
    assert_eq!(json["z_scores"].as_array().unwrap().len(), 3);
}

#[test]
fn failing_entropy_source_aborts_suite() {
    struct Empty;
    impl hashprobe_core::ByteSource for Empty {
        fn fill(&self, _buf: &mut [u8]) -> Result<(), hashprobe_core::EntropyError> {
            Err(hashprobe_core::EntropyError("drained".into()))
        }
    }

    let orch = Orchestrator::new(quick_config(100, 5))
        .unwrap()
        .with_source(Arc::new(Empty));
    let entries = orch.run_suite(&[&HashAlgorithm::Sha3_256], TestKind::Hamming);
    assert!(matches!(entries[0].result, Err(ProbeError::Entropy(_))));
}

#[test]
#[ignore] // Run with: cargo test -- --ignored
fn ideal_oracle_z_scores_look_standard_normal() {
    let orch = Orchestrator::new(quick_config(1000, 2000)).unwrap();
    let factory = FnFactory::new("oracle", || {
        Box::new(IdealOracle::new(32)) as Box<dyn HashAdapter>
    });
    for kind in [TestKind::Hamming, TestKind::BitPrediction] {
        let summary = orch.run_repeated(&factory, kind).unwrap();
        // Standard error of the pass rate is ~0.005 at 2000 repetitions.
        assert!(
            (0.935..0.965).contains(&summary.pass_rate),
            "{kind}: pass rate {}",
            summary.pass_rate
        );
        assert!(summary.mean_z.abs() < 0.15, "{kind}: mean z {}", summary.mean_z);
        assert!(
            (0.9..1.1).contains(&summary.std_dev_z),
            "{kind}: std z {}",
            summary.std_dev_z
        );
    }
}

#[test]
#[ignore] // Run with: cargo test -- --ignored
fn builtin_hashes_reference_run() {
    // The reference configuration: 1000 trials, 10000 repetitions.
    let orch = Orchestrator::new(SuiteConfig::default()).unwrap();
    for algo in HashAlgorithm::ALL {
        let summary = orch.run_repeated(&algo, TestKind::Hamming).unwrap();
        assert!(
            (0.94..0.96).contains(&summary.pass_rate),
            "{algo}: pass rate {}",
            summary.pass_rate
        );
    }
}
