//! Top-level application orchestration.
//!
//! `src/main.rs` only maps errors to exit codes; this module:
//! - loads `.env` and initializes logging
//! - parses CLI arguments (after rewriting the legacy short flags)
//! - echoes the run arguments to stdout
//! - runs the recovery pipeline with the default candidate registry

use clap::Parser;
use env_logger::Env;
use log::{debug, info};

use crate::cli::Cli;
use crate::domain::{DataSource, RecoveryConfig, RunConfig};
use crate::error::AppError;
use crate::fit::{Registry, derive_seed};

pub mod pipeline;

/// Entry point for the `recov` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    // A logger may already be installed when embedded (tests).
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();

    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);

    println!("{}", cli.runtime);
    println!("{}", cli.iteration);
    println!("{}", cli.samples);
    println!("{}", cli.burn);
    println!("{}", cli.chains);

    let config = recovery_config_from_args(&cli)?;
    debug!("{config:?}");
    let output = pipeline::run_recovery(&config, &Registry::default())?;
    info!(
        "Done: {} candidates, best by DIC {}",
        output.fits.models.len(),
        output
            .tables
            .dic
            .best()
            .map(|r| r.model.as_str())
            .unwrap_or("-")
    );
    Ok(())
}

/// Convert parsed flags into a validated `RecoveryConfig`.
pub fn recovery_config_from_args(cli: &Cli) -> Result<RecoveryConfig, AppError> {
    let run = RunConfig {
        runtime_id: cli.runtime.clone(),
        iterations: cli.iteration,
        samples: cli.samples,
        burn: cli.burn,
        chains: cli.chains,
        thin: cli.thin,
        seed: cli.seed,
        ppc_draws: cli.ppc_draws,
    };
    run.validate()?;

    let source = match cli.simulate {
        Some(model) => DataSource::Simulate {
            model,
            subjects: cli.subjects,
            trials_per_subject: cli.trials,
            seed: derive_seed(cli.seed, "synthetic-data"),
        },
        None => DataSource::Csv {
            path: cli.data.clone(),
            condition_column: cli.condition_column.clone(),
        },
    };

    Ok(RecoveryConfig {
        run,
        source,
        out_dir: cli.out_dir.clone(),
        weight_method: cli.weights,
    })
}

/// Legacy single-dash flags and their long equivalents.
const LEGACY_FLAGS: [(&str, &str); 5] = [
    ("-rt", "--runtime"),
    ("-it", "--iteration"),
    ("-sp", "--samples"),
    ("-bn", "--burn"),
    ("-ch", "--chains"),
];

/// Rewrite argv so the legacy two-letter flags parse as long options.
///
/// Rules:
/// - `-rt 5`   -> `--runtime 5`
/// - `-rt=5`   -> `--runtime=5`
/// - anything else is left untouched
pub fn rewrite_args(argv: Vec<String>) -> Vec<String> {
    argv.into_iter()
        .enumerate()
        .map(|(i, arg)| if i == 0 { arg } else { rewrite_flag(arg) })
        .collect()
}

fn rewrite_flag(arg: String) -> String {
    let (flag, value) = match arg.split_once('=') {
        Some((flag, value)) => (flag, Some(value)),
        None => (arg.as_str(), None),
    };
    match LEGACY_FLAGS.iter().find(|(short, _)| *short == flag) {
        Some((_, long)) => match value {
            Some(v) => format!("{long}={v}"),
            None => (*long).to_string(),
        },
        None => arg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn legacy_flags_become_long_options() {
        let out = rewrite_args(argv(&["recov", "-rt", "7", "-sp=500", "-bn", "100", "-ch", "2", "-it", "3"]));
        assert_eq!(
            out,
            argv(&[
                "recov",
                "--runtime",
                "7",
                "--samples=500",
                "--burn",
                "100",
                "--chains",
                "2",
                "--iteration",
                "3"
            ])
        );
    }

    #[test]
    fn other_arguments_are_untouched() {
        let args = argv(&["recov", "--thin", "2", "-rtx", "--data=a=b.csv"]);
        assert_eq!(rewrite_args(args.clone()), args);
    }

    #[test]
    fn legacy_arguments_parse_end_to_end() {
        let cli = Cli::parse_from(rewrite_args(argv(&["recov", "-rt", "abc", "-sp", "300", "-bn", "150"])));
        assert_eq!(cli.runtime, "abc");
        assert_eq!(cli.samples, 300);
        assert_eq!(cli.burn, 150);
    }

    #[test]
    fn config_from_args_selects_the_data_source() {
        let mut cli = Cli::parse_from(["recov", "--data", "trials.csv", "--condition-column", "stim"]);
        let config = recovery_config_from_args(&cli).unwrap();
        assert_eq!(
            config.source,
            DataSource::Csv {
                path: PathBuf::from("trials.csv"),
                condition_column: "stim".to_string()
            }
        );

        cli.simulate = Some(crate::domain::ModelKey::Ms2);
        let config = recovery_config_from_args(&cli).unwrap();
        assert!(matches!(config.source, DataSource::Simulate { subjects: 5, trials_per_subject: 100, .. }));
    }

    #[test]
    fn invalid_burn_is_a_data_error() {
        let cli = Cli::parse_from(["recov", "--samples", "100", "--burn", "100"]);
        let err = recovery_config_from_args(&cli).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }
}
