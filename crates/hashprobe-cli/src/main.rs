//! CLI for hashprobe — avalanche and bit-bias verdicts for hash functions.

mod commands;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hashprobe")]
#[command(about = "hashprobe — does your hash behave like a random oracle?")]
#[command(version = hashprobe_core::VERSION)]
struct Cli {
    /// Log per-run verdicts and worker progress (same as RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every sampling command.
#[derive(Args)]
struct ProbeArgs {
    /// Hash algorithm to test; repeat for several (default: all built-ins)
    #[arg(long = "hash")]
    hashes: Vec<String>,

    /// Statistical probe to run
    #[arg(long, default_value = "hamming", value_parser = ["hamming", "bits"])]
    test: String,

    /// Trials per run (N)
    #[arg(long, default_value = "1000")]
    trials: u64,

    /// Two-tailed confidence level; 0.95 uses the reference critical value 1.96
    #[arg(long, default_value = "0.95")]
    confidence: f64,

    /// Random input length in bytes
    #[arg(long, default_value = "64")]
    input_len: usize,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in hash algorithms
    List,

    /// Sample and judge each hash once
    Run {
        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// Repeat the test R times per hash and summarize pass rate and z-scores
    Repeat {
        #[command(flatten)]
        probe: ProbeArgs,

        /// Independent runs per hash (R)
        #[arg(long, default_value = "10000")]
        repetitions: usize,

        /// Print summaries as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Commands::List => commands::list::run(),
        Commands::Run { probe } => {
            let setup = commands::setup(&probe, 1);
            commands::run::run(&setup);
        }
        Commands::Repeat {
            probe,
            repetitions,
            json,
        } => {
            let setup = commands::setup(&probe, repetitions);
            commands::repeat::run(&setup, json);
        }
    }
}
