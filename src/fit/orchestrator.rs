//! Fit every registered candidate and convert the fits into inference
//! summaries.
//!
//! Candidates run in parallel; results come back in registry order. The first
//! failure aborts the whole run, and nothing downstream starts until every fit
//! has finished.

use log::{info, warn};
use rayon::prelude::*;

use crate::domain::{Dataset, ModelKey, RunConfig};
use crate::error::AppError;
use crate::fit::fitted::FittedModel;
use crate::fit::registry::{Registry, RegistryEntry, derive_seed};
use crate::inference::{InferenceSummary, to_inference_summary};

/// R̂ above this is reported as a convergence warning.
const RHAT_WARN: f64 = 1.1;

/// Fits and summaries for every candidate, in registry order.
#[derive(Debug, Clone)]
pub struct FitCollection {
    pub models: Vec<(ModelKey, FittedModel)>,
    pub summaries: Vec<(ModelKey, InferenceSummary)>,
}

impl FitCollection {
    pub fn keys(&self) -> Vec<ModelKey> {
        self.models.iter().map(|(k, _)| *k).collect()
    }

    pub fn model(&self, key: ModelKey) -> Option<&FittedModel> {
        self.models.iter().find(|(k, _)| *k == key).map(|(_, m)| m)
    }

    pub fn summary(&self, key: ModelKey) -> Option<&InferenceSummary> {
        self.summaries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, s)| s)
    }
}

/// Run every registered candidate against `dataset`.
pub fn fit_all(
    dataset: &Dataset,
    config: &RunConfig,
    registry: &Registry,
) -> Result<FitCollection, AppError> {
    config.validate()?;
    let results = registry
        .entries()
        .par_iter()
        .map(|entry| fit_one(entry, dataset, config))
        .collect::<Result<Vec<_>, _>>()?;

    let mut models = Vec::with_capacity(results.len());
    let mut summaries = Vec::with_capacity(results.len());
    for (key, fitted, summary) in results {
        models.push((key, fitted));
        summaries.push((key, summary));
    }

    Ok(FitCollection { models, summaries })
}

fn fit_one(
    entry: &RegistryEntry,
    dataset: &Dataset,
    config: &RunConfig,
) -> Result<(ModelKey, FittedModel, InferenceSummary), AppError> {
    let key = entry.key;
    let model_config = RunConfig {
        seed: derive_seed(config.seed, key.as_str()),
        ..config.clone()
    };

    info!("{key}: fitting ({})", entry.runner.describe());
    let fitted = entry
        .runner
        .fit(dataset, &model_config)
        .map_err(|e| AppError::fit(format!("Model {key} failed to fit: {e}")))?;

    let summary = to_inference_summary(&fitted, dataset, &model_config)
        .map_err(|e| AppError::new(e.exit_code(), format!("Model {key}: {e}")))?;

    info!(
        "{key}: {} draws over {} chains, mean acceptance {:.3}",
        fitted.total_draws(),
        fitted.chains().len(),
        fitted.mean_acceptance()
    );
    for (name, r) in summary.param_names().iter().zip(summary.rhat()) {
        if *r > RHAT_WARN {
            warn!("{key}: R-hat {r:.3} for {name} suggests the chains have not converged");
        }
    }
    if let Some(check) = summary.predictive_check() {
        info!(
            "{key}: mean rt observed {:.3} / predicted {:.3}, upper rate observed {:.3} / predicted {:.3}",
            check.observed_mean_rt,
            check.predicted_mean_rt,
            check.observed_upper_rate,
            check.predicted_upper_rate
        );
    }

    Ok((key, fitted, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Trial;
    use crate::fit::registry::ModelRunner;

    struct Failing;

    impl ModelRunner for Failing {
        fn fit(&self, _: &Dataset, _: &RunConfig) -> Result<FittedModel, AppError> {
            Err(AppError::fit("sampler diverged"))
        }

        fn describe(&self) -> String {
            "always fails".to_string()
        }
    }

    fn dataset() -> Dataset {
        let trials = (0..16)
            .map(|i| Trial {
                subject: 1 + (i % 2) as u32,
                rt: 0.45 + 0.03 * i as f64,
                response: u8::from(i % 4 != 0),
                condition: if i % 3 == 0 { "LC" } else { "HC" }.to_string(),
            })
            .collect();
        Dataset::new(trials).unwrap()
    }

    fn config() -> RunConfig {
        RunConfig {
            runtime_id: "t".to_string(),
            iterations: 1,
            samples: 40,
            burn: 20,
            chains: 2,
            thin: 1,
            seed: 3,
            ppc_draws: 2,
        }
    }

    #[test]
    fn produces_one_entry_per_key_in_registry_order() {
        let ds = dataset();
        let fits = fit_all(&ds, &config(), &Registry::default()).unwrap();
        assert_eq!(fits.keys(), ModelKey::ALL.to_vec());
        let summary_keys: Vec<ModelKey> = fits.summaries.iter().map(|(k, _)| *k).collect();
        assert_eq!(summary_keys, ModelKey::ALL.to_vec());
        assert_eq!(fits.summary(ModelKey::Ms2).unwrap().n_draws(), 40);
        assert!(fits.model(ModelKey::Ms7).is_some());
    }

    #[test]
    fn results_do_not_depend_on_scheduling() {
        let ds = dataset();
        let a = fit_all(&ds, &config(), &Registry::default()).unwrap();
        let b = fit_all(&ds, &config(), &Registry::default()).unwrap();
        for ((_, x), (_, y)) in a.models.iter().zip(&b.models) {
            assert_eq!(x.chains()[0].draws, y.chains()[0].draws);
        }
    }

    #[test]
    fn invalid_config_is_rejected_before_fitting() {
        let ds = dataset();
        let cfg = RunConfig {
            samples: 10,
            burn: 20,
            ..config()
        };
        let err = fit_all(&ds, &cfg, &Registry::default()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }

    #[test]
    fn one_failing_runner_aborts_the_run() {
        let ds = dataset();
        let mut registry = Registry::default();
        registry.replace(ModelKey::Ms3, Box::new(Failing)).unwrap();
        let err = fit_all(&ds, &config(), &registry).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_FIT);
        assert!(err.message().contains("ms3"));
    }
}
