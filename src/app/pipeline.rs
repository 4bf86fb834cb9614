//! The model-recovery workflow, independent of argument parsing.
//!
//! load data -> fit every candidate -> compare -> write reports
//!
//! Comparison only starts after every fit succeeds, and reports are written
//! only after all three tables exist, so a failed run leaves no partial output.

use std::path::PathBuf;

use log::info;

use crate::compare::compare_all;
use crate::data::simulate_dataset;
use crate::domain::{ComparisonSet, DataSource, Dataset, RecoveryConfig};
use crate::error::AppError;
use crate::fit::{FitCollection, Registry, fit_all};
use crate::io::{load_dataset, write_reports};
use crate::report::{format_comparison, format_dataset_stats};

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RecoveryOutput {
    pub fits: FitCollection,
    pub tables: ComparisonSet,
    /// Report files, in DIC, LOO, WAIC order.
    pub reports: Vec<PathBuf>,
}

/// Read or simulate the dataset described by `source`.
pub fn load_source(source: &DataSource) -> Result<Dataset, AppError> {
    match source {
        DataSource::Csv {
            path,
            condition_column,
        } => {
            info!("Loading trials from {}", path.display());
            load_dataset(path, condition_column)
        }
        DataSource::Simulate {
            model,
            subjects,
            trials_per_subject,
            seed,
        } => {
            info!("Simulating {subjects} subjects x {trials_per_subject} trials from {model}");
            simulate_dataset(*model, *subjects, *trials_per_subject, *seed)
        }
    }
}

/// Fit, compare and report on an already-loaded dataset.
pub fn run_with_dataset(
    dataset: &Dataset,
    config: &RecoveryConfig,
    registry: &Registry,
) -> Result<RecoveryOutput, AppError> {
    config.run.validate()?;
    info!("{}", format_dataset_stats(&dataset.stats()));

    let fits = fit_all(dataset, &config.run, registry)?;
    let tables = compare_all(&fits, config.weight_method)?;
    for table in [&tables.dic, &tables.loo, &tables.waic] {
        info!("{}", format_comparison(table));
    }

    let reports = write_reports(&config.out_dir, &config.run.runtime_id, &tables)?;
    for path in &reports {
        info!("Wrote {}", path.display());
    }

    Ok(RecoveryOutput {
        fits,
        tables,
        reports,
    })
}

/// Execute the full workflow described by `config`.
pub fn run_recovery(config: &RecoveryConfig, registry: &Registry) -> Result<RecoveryOutput, AppError> {
    let dataset = load_source(&config.source)?;
    run_with_dataset(&dataset, config, registry)
}
