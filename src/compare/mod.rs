//! Rank fitted candidates by DIC, PSIS-LOO and WAIC.

pub mod criteria;
pub mod psis;
pub mod weights;

pub use criteria::{IcEstimate, loo, waic};
pub use weights::model_weights;

use log::warn;

use crate::domain::{
    ComparisonRow, ComparisonSet, ComparisonTable, Criterion, ModelKey, RowDiagnostics,
    WeightMethod,
};
use crate::error::AppError;
use crate::fit::{FitCollection, FittedModel};
use crate::inference::InferenceSummary;
use crate::math::stats::variance;

/// Compare candidates by a pointwise criterion (`Loo` or `Waic`).
///
/// Rows are sorted by elpd, best first; equal values keep input order.
pub fn compare(
    summaries: &[(ModelKey, InferenceSummary)],
    criterion: Criterion,
    weight_method: WeightMethod,
) -> Result<ComparisonTable, AppError> {
    let Some((_, first)) = summaries.first() else {
        return Err(AppError::comparison("No fitted models to compare."));
    };
    let n_obs = first.n_obs();
    if let Some((key, s)) = summaries.iter().find(|(_, s)| s.n_obs() != n_obs) {
        return Err(AppError::comparison(format!(
            "Model {key} has {} observations, expected {n_obs}.",
            s.n_obs()
        )));
    }

    let mut estimates = Vec::with_capacity(summaries.len());
    for (key, summary) in summaries {
        let ll = summary.pooled_log_likelihood();
        let estimate = match criterion {
            Criterion::Loo => loo(&ll),
            Criterion::Waic => waic(&ll),
            Criterion::Dic => {
                return Err(AppError::comparison(
                    "DIC is computed from fitted models, use dic_table.",
                ));
            }
        }
        .map_err(|e| AppError::comparison(format!("Model {key}: {e}")))?;
        if estimate.warning {
            warn!(
                "{key}: {} estimate may be unreliable ({})",
                criterion.as_str(),
                match criterion {
                    Criterion::Loo => "Pareto k above threshold",
                    _ => "pointwise variance above 0.4",
                }
            );
        }
        estimates.push((*key, estimate));
    }

    let pointwise: Vec<&[f64]> = estimates.iter().map(|(_, e)| e.pointwise.as_slice()).collect();
    let elpd: Vec<f64> = estimates.iter().map(|(_, e)| e.elpd).collect();
    let weights = model_weights(weight_method, &pointwise, &elpd);

    let mut order: Vec<usize> = (0..estimates.len()).collect();
    order.sort_by(|&a, &b| elpd[b].total_cmp(&elpd[a]));

    let best = &estimates[order[0]].1;
    let rows = order
        .iter()
        .enumerate()
        .map(|(rank, &i)| {
            let (model, est) = &estimates[i];
            let diff: Vec<f64> = best
                .pointwise
                .iter()
                .zip(&est.pointwise)
                .map(|(b, x)| b - x)
                .collect();
            let dse = if rank == 0 {
                0.0
            } else {
                (n_obs as f64 * variance(&diff, 0)).sqrt()
            };
            ComparisonRow {
                model: *model,
                rank,
                value: est.elpd,
                diagnostics: RowDiagnostics::Ic {
                    p: est.p,
                    elpd_diff: best.elpd - est.elpd,
                    weight: weights[i],
                    se: est.se,
                    dse,
                    warning: est.warning,
                },
            }
        })
        .collect();

    Ok(ComparisonTable { criterion, rows })
}

/// Rank candidates by DIC, lowest first; equal values keep input order.
pub fn dic_table(models: &[(ModelKey, FittedModel)]) -> Result<ComparisonTable, AppError> {
    if models.is_empty() {
        return Err(AppError::comparison("No fitted models to compare."));
    }

    let mut scored = Vec::with_capacity(models.len());
    for (key, fitted) in models {
        let combined = fitted
            .concat_chains()
            .map_err(|e| AppError::comparison(format!("Model {key}: {e}")))?;
        scored.push((*key, combined.dic, combined.p_d, combined.d_bar));
    }
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));

    let rows = scored
        .into_iter()
        .enumerate()
        .map(|(rank, (model, dic, p_d, d_bar))| ComparisonRow {
            model,
            rank,
            value: dic,
            diagnostics: RowDiagnostics::Dic { p_d, d_bar },
        })
        .collect();

    Ok(ComparisonTable {
        criterion: Criterion::Dic,
        rows,
    })
}

/// All three tables for one run.
pub fn compare_all(
    fits: &FitCollection,
    weight_method: WeightMethod,
) -> Result<ComparisonSet, AppError> {
    Ok(ComparisonSet {
        dic: dic_table(&fits.models)?,
        loo: compare(&fits.summaries, Criterion::Loo, weight_method)?,
        waic: compare(&fits.summaries, Criterion::Waic, weight_method)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dataset, RunConfig, Trial};
    use crate::fit::{DdmRunner, ModelRunner, Registry, fit_all};
    use nalgebra::DMatrix;

    fn summary(ll_value: impl Fn(usize, usize) -> f64, n_obs: usize) -> InferenceSummary {
        let ll = DMatrix::from_fn(30, n_obs, &ll_value);
        let post = DMatrix::from_fn(30, 1, |s, _| s as f64 * 0.01);
        InferenceSummary::new(
            vec!["v".to_string()],
            vec![post],
            vec![ll],
            Vec::new(),
            vec![0.5; n_obs],
            vec![1; n_obs],
        )
        .unwrap()
    }

    fn dataset() -> Dataset {
        let trials = (0..20)
            .map(|i| Trial {
                subject: 1 + (i % 2) as u32,
                rt: 0.4 + 0.025 * i as f64,
                response: u8::from(i % 3 != 0),
                condition: if i % 2 == 0 { "HC" } else { "LC" }.to_string(),
            })
            .collect();
        Dataset::new(trials).unwrap()
    }

    fn config() -> RunConfig {
        RunConfig {
            runtime_id: "cmp".to_string(),
            iterations: 1,
            samples: 60,
            burn: 30,
            chains: 2,
            thin: 1,
            seed: 9,
            ppc_draws: 0,
        }
    }

    #[test]
    fn sorts_by_elpd_descending_with_zero_based_rank() {
        let noise = |s: usize, i: usize| 0.01 * (((s * 7 + i * 3) % 5) as f64 - 2.0);
        let summaries = vec![
            (ModelKey::Ms0, summary(|s, i| -2.0 + noise(s, i), 10)),
            (ModelKey::Ms1, summary(|s, i| -1.0 + noise(s, i), 10)),
            (ModelKey::Ms2, summary(|s, i| -1.5 + noise(s, i), 10)),
        ];
        let table = compare(&summaries, Criterion::Waic, WeightMethod::PseudoBma).unwrap();

        let keys: Vec<ModelKey> = table.rows.iter().map(|r| r.model).collect();
        assert_eq!(keys, vec![ModelKey::Ms1, ModelKey::Ms2, ModelKey::Ms0]);
        let ranks: Vec<usize> = table.rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);

        let RowDiagnostics::Ic { elpd_diff, dse, weight, .. } = table.rows[0].diagnostics else {
            panic!("expected IC diagnostics");
        };
        assert_eq!(elpd_diff, 0.0);
        assert_eq!(dse, 0.0);
        assert!(weight > 0.99);

        let total: f64 = table
            .rows
            .iter()
            .map(|r| match r.diagnostics {
                RowDiagnostics::Ic { weight, .. } => weight,
                RowDiagnostics::Dic { .. } => 0.0,
            })
            .sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ties_keep_registry_order() {
        let summaries = vec![
            (ModelKey::Ms4, summary(|_, _| -1.0, 5)),
            (ModelKey::Ms2, summary(|_, _| -1.0, 5)),
        ];
        let table = compare(&summaries, Criterion::Waic, WeightMethod::Stacking).unwrap();
        assert_eq!(table.rows[0].model, ModelKey::Ms4);
        assert_eq!(table.rows[1].model, ModelKey::Ms2);
    }

    #[test]
    fn dic_ties_keep_registry_order() {
        let ds = dataset();
        let fitted = DdmRunner::new(ModelKey::Ms0.spec())
            .fit(&ds, &config())
            .unwrap();
        let models = vec![(ModelKey::Ms4, fitted.clone()), (ModelKey::Ms2, fitted)];
        let table = dic_table(&models).unwrap();

        assert_eq!(table.rows[0].value, table.rows[1].value);
        let order: Vec<(ModelKey, usize)> = table.rows.iter().map(|r| (r.model, r.rank)).collect();
        assert_eq!(order, vec![(ModelKey::Ms4, 0), (ModelKey::Ms2, 1)]);
    }

    #[test]
    fn mismatched_observation_counts_are_rejected() {
        let summaries = vec![
            (ModelKey::Ms0, summary(|_, _| -1.0, 5)),
            (ModelKey::Ms1, summary(|_, _| -1.0, 6)),
        ];
        let err = compare(&summaries, Criterion::Loo, WeightMethod::Stacking).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_COMPARISON);
        assert!(compare(&[], Criterion::Loo, WeightMethod::Stacking).is_err());
    }

    #[test]
    fn all_tables_cover_every_model_once() {
        let ds = dataset();
        let fits = fit_all(&ds, &config(), &Registry::default()).unwrap();
        let set = compare_all(&fits, WeightMethod::Stacking).unwrap();

        for table in [&set.dic, &set.loo, &set.waic] {
            let mut keys: Vec<ModelKey> = table.rows.iter().map(|r| r.model).collect();
            keys.sort();
            assert_eq!(keys, ModelKey::ALL.to_vec());
            let ranks: Vec<usize> = table.rows.iter().map(|r| r.rank).collect();
            assert_eq!(ranks, (0..8).collect::<Vec<_>>());
        }
        assert!(set.dic.rows.windows(2).all(|w| w[0].value <= w[1].value));
        assert!(set.loo.rows.windows(2).all(|w| w[0].value >= w[1].value));
    }
}
