use std::time::Instant;

use hashprobe_core::{HashFactory, TestOutcome};

use super::Setup;

pub fn run(setup: &Setup) {
    let config = setup.orchestrator.config();
    println!(
        "Running {} test on {} hash(es), {} trials each (critical value {:.3})...\n",
        setup.kind,
        setup.algorithms.len(),
        config.trials,
        config.confidence.critical_value()
    );

    let mut fatal = false;
    for algo in &setup.algorithms {
        let t0 = Instant::now();
        match setup.orchestrator.run_test(algo, setup.kind) {
            Ok(outcome) => print_outcome(algo.name(), &outcome, t0.elapsed().as_secs_f64()),
            Err(e) => {
                log::error!("{algo}: {e}");
                eprintln!("  {:<12} ✗ aborted: {e}", algo.name());
                fatal = true;
            }
        }
    }

    if fatal {
        std::process::exit(1);
    }
}

fn print_outcome(name: &str, outcome: &TestOutcome, secs: f64) {
    let verdict = outcome.verdict();
    let mark = if verdict.passed { "✓" } else { "✗" };
    match outcome {
        TestOutcome::Hamming(report) => {
            println!(
                "  {mark} {name:<12} mean distance {:.4} (ideal {:.1})  z={:+.4}  p={:.4}  [{secs:.2}s]",
                report.sample.mean_distance, report.model.hamming_mean, verdict.z_score, verdict.p_value
            );
        }
        TestOutcome::BitPrediction(report) => {
            println!(
                "  {mark} {name:<12} {}/{} bits unbiased ({:.2}%)  z={:+.4}  [{secs:.2}s]",
                report.passed_bits,
                report.bit_width(),
                report.pass_fraction() * 100.0,
                verdict.z_score
            );
            let failing = report.failing_bits();
            if !failing.is_empty() {
                let shown: Vec<String> = failing.iter().take(16).map(|k| k.to_string()).collect();
                let more = if failing.len() > 16 { ", ..." } else { "" };
                println!("      biased bit positions: {}{more}", shown.join(", "));
            }
        }
    }
    if outcome.failed_trials() > 0 {
        println!(
            "      warning: {} trial(s) recorded as zero after hashing failures",
            outcome.failed_trials()
        );
    }
}
