pub mod list;
pub mod repeat;
pub mod run;

use hashprobe_core::{
    Confidence, HashAlgorithm, Orchestrator, ProbeError, SuiteConfig, TestKind,
    host_parallelism,
};

use crate::ProbeArgs;

/// Everything a sampling command needs, resolved from the CLI flags.
pub struct Setup {
    pub algorithms: Vec<HashAlgorithm>,
    pub kind: TestKind,
    pub orchestrator: Orchestrator,
}

/// Resolve flags into an orchestrator, exiting with a message on bad input.
pub fn setup(args: &ProbeArgs, repetitions: usize) -> Setup {
    let algorithms = parse_hashes(&args.hashes);
    let kind: TestKind = args.test.parse().unwrap_or_else(|e| fail(e));
    let confidence = confidence_for(args.confidence).unwrap_or_else(|e| fail(e));

    let config = SuiteConfig {
        trials: args.trials,
        repetitions,
        input_len: args.input_len,
        confidence,
        workers: args.workers.unwrap_or_else(host_parallelism),
    };
    let orchestrator = Orchestrator::new(config).unwrap_or_else(|e| fail(e));

    Setup {
        algorithms,
        kind,
        orchestrator,
    }
}

/// Map `--confidence` to a critical value. 0.95 keeps the rounded 1.96 so
/// results line up with published tables.
pub fn confidence_for(level: f64) -> Result<Confidence, ProbeError> {
    if (level - 0.95).abs() < f64::EPSILON {
        Ok(Confidence::reference())
    } else {
        Confidence::from_level(level)
    }
}

/// Parse `--hash` values; an empty list selects every built-in algorithm.
pub fn parse_hashes(names: &[String]) -> Vec<HashAlgorithm> {
    if names.is_empty() {
        return HashAlgorithm::ALL.to_vec();
    }
    names
        .iter()
        .flat_map(|n| n.split(','))
        .map(|n| n.trim().parse::<HashAlgorithm>().unwrap_or_else(|e| fail(e)))
        .collect()
}

fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(2);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_hash_list_selects_all() {
        assert_eq!(parse_hashes(&[]), HashAlgorithm::ALL.to_vec());
    }

    #[test]
    fn default_confidence_uses_rounded_critical_value() {
        let c = confidence_for(0.95).unwrap();
        assert_eq!(c, Confidence::reference());
        assert_eq!(c.critical_value(), 1.96);
    }

    #[test]
    fn other_confidence_levels_use_normal_quantile() {
        let c = confidence_for(0.99).unwrap();
        assert_eq!(c.level(), 0.99);
        assert!((c.critical_value() - 2.575829).abs() < 1e-5);
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        assert!(matches!(confidence_for(1.5), Err(ProbeError::InvalidConfig(_))));
        assert!(confidence_for(0.0).is_err());
    }

    #[test]
    fn comma_separated_hashes() {
        let parsed = parse_hashes(&["sha256, blake3".to_string(), "sha3-256".to_string()]);
        assert_eq!(
            parsed,
            vec![
                HashAlgorithm::Sha256,
                HashAlgorithm::Blake3,
                HashAlgorithm::Sha3_256
            ]
        );
    }
}
