//! Command-line parsing for the model-recovery runner.
//!
//! The five sampler flags keep their historical short spellings (`-rt`,
//! `-it`, `-sp`, `-bn`, `-ch`); `app::rewrite_args` maps those onto the long
//! forms before clap sees them.

use std::path::PathBuf;

use clap::Parser;

use crate::domain::{ModelKey, WeightMethod};

/// Top-level CLI.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "recov",
    version,
    about = "Fit eight hierarchical DDM candidates and rank them by DIC, LOO and WAIC"
)]
pub struct Cli {
    /// Runtime id; becomes part of every output filename.
    #[arg(long, default_value = "0")]
    pub runtime: String,

    /// Iteration index of the recovery study (logged only).
    #[arg(long, default_value_t = 1)]
    pub iteration: u32,

    /// Sampler iterations per chain, burn-in included.
    #[arg(long, default_value_t = 2000)]
    pub samples: usize,

    /// Leading iterations discarded from each chain.
    #[arg(long, default_value_t = 1000)]
    pub burn: usize,

    /// Independent chains per candidate.
    #[arg(long, default_value_t = 4)]
    pub chains: usize,

    /// Trial-level CSV to fit.
    #[arg(long, env = "RECOV_DATA", default_value = "data/cavanagh_theta_nn.csv")]
    pub data: PathBuf,

    /// Column holding the condition label.
    #[arg(long, env = "RECOV_CONDITION_COLUMN", default_value = "conf")]
    pub condition_column: String,

    /// Directory the three report CSVs are written into (must exist).
    #[arg(long, env = "RECOV_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Base random seed; per-model and per-chain seeds are derived from it.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Keep every n-th post-burn-in draw.
    #[arg(long, default_value_t = 1)]
    pub thin: usize,

    /// Posterior predictive replicates per candidate.
    #[arg(long, default_value_t = 20)]
    pub ppc_draws: usize,

    /// Model weights in the LOO/WAIC tables.
    #[arg(long, value_enum, default_value_t = WeightMethod::Stacking)]
    pub weights: WeightMethod,

    /// Fit simulated data from this candidate instead of `--data`.
    #[arg(long, value_enum)]
    pub simulate: Option<ModelKey>,

    /// Subjects in simulated data.
    #[arg(long, default_value_t = 5)]
    pub subjects: usize,

    /// Trials per subject in simulated data.
    #[arg(long, default_value_t = 100)]
    pub trials: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_documented_values() {
        let cli = Cli::try_parse_from(["recov"]).unwrap();
        assert_eq!(cli.runtime, "0");
        assert_eq!(cli.iteration, 1);
        assert_eq!(cli.samples, 2000);
        assert_eq!(cli.burn, 1000);
        assert_eq!(cli.chains, 4);
        assert_eq!(cli.weights, WeightMethod::Stacking);
        assert!(cli.simulate.is_none());
    }

    #[test]
    fn parses_simulation_options() {
        let cli = Cli::try_parse_from([
            "recov",
            "--simulate",
            "ms5",
            "--subjects",
            "3",
            "--weights",
            "pseudo-bma",
        ])
        .unwrap();
        assert_eq!(cli.simulate, Some(ModelKey::Ms5));
        assert_eq!(cli.subjects, 3);
        assert_eq!(cli.weights, WeightMethod::PseudoBma);
    }
}
