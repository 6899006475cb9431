use hashprobe_core::{HashFactory, RunSummary};

use super::Setup;

pub fn run(setup: &Setup, json: bool) {
    let config = setup.orchestrator.config();
    if !json {
        println!(
            "Repeating {} test {} times per hash, {} trials per run...",
            setup.kind, config.repetitions, config.trials
        );
    }

    let factories: Vec<&dyn HashFactory> = setup
        .algorithms
        .iter()
        .map(|a| a as &dyn HashFactory)
        .collect();
    let entries = setup.orchestrator.run_suite(&factories, setup.kind);

    let mut summaries = Vec::new();
    let mut fatal = false;
    for entry in entries {
        match entry.result {
            Ok(summary) => {
                if !json {
                    print_summary(&summary);
                }
                summaries.push(summary);
            }
            Err(e) => {
                eprintln!("\nResults for {}:\n  aborted: {e}", entry.algorithm);
                fatal = true;
            }
        }
    }

    if json {
        match serde_json::to_string_pretty(&summaries) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Failed to serialize summaries: {e}");
                fatal = true;
            }
        }
    }

    if fatal {
        std::process::exit(1);
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\nResults for {}:", summary.algorithm);
    println!(
        "  Tests passed: {}/{} ({:.2}%)",
        summary.passed,
        summary.repetitions,
        summary.pass_rate * 100.0
    );
    println!("  Mean Z-score: {:.4}", summary.mean_z);
    println!("  StdDev Z-score: {:.4}", summary.std_dev_z);
}
