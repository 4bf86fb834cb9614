//! Standardized per-model inference container.
//!
//! An `InferenceSummary` holds what cross-model comparison needs, independent
//! of how the model was fit:
//!
//! - posterior draws per chain (draws × parameters)
//! - pointwise log-likelihood per chain (draws × observations)
//! - posterior predictive datasets simulated from a subset of draws
//! - the observed data and per-parameter split-R̂
//!
//! `to_inference_summary` builds one from a `FittedModel`.

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use rayon::prelude::*;

use crate::domain::{Dataset, RunConfig};
use crate::error::AppError;
use crate::fit::fitted::FittedModel;
use crate::fit::registry::derive_seed;
use crate::inference::diagnostics::split_rhat;
use crate::math::stats;
use crate::models::CompiledModel;

/// One simulated replicate of the observed dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictiveDraw {
    pub chain: usize,
    pub draw: usize,
    pub rt: Vec<f64>,
    pub response: Vec<u8>,
}

/// Observed vs posterior-predictive summary statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictiveCheck {
    pub observed_mean_rt: f64,
    pub predicted_mean_rt: f64,
    pub observed_upper_rate: f64,
    pub predicted_upper_rate: f64,
}

#[derive(Debug, Clone)]
pub struct InferenceSummary {
    param_names: Vec<String>,
    posterior: Vec<DMatrix<f64>>,
    log_likelihood: Vec<DMatrix<f64>>,
    posterior_predictive: Vec<PredictiveDraw>,
    observed_rt: Vec<f64>,
    observed_response: Vec<u8>,
    rhat: Vec<f64>,
}

impl InferenceSummary {
    /// Assemble a summary, checking that every piece has a consistent shape.
    pub fn new(
        param_names: Vec<String>,
        posterior: Vec<DMatrix<f64>>,
        log_likelihood: Vec<DMatrix<f64>>,
        posterior_predictive: Vec<PredictiveDraw>,
        observed_rt: Vec<f64>,
        observed_response: Vec<u8>,
    ) -> Result<Self, AppError> {
        if posterior.is_empty() {
            return Err(AppError::fit("Inference summary has no chains."));
        }
        if posterior.len() != log_likelihood.len() {
            return Err(AppError::fit(format!(
                "Posterior has {} chains but log-likelihood has {}.",
                posterior.len(),
                log_likelihood.len()
            )));
        }
        if observed_rt.len() != observed_response.len() {
            return Err(AppError::fit("Observed rt/response lengths differ."));
        }
        let n_obs = observed_rt.len();
        for (c, (post, ll)) in posterior.iter().zip(&log_likelihood).enumerate() {
            if post.ncols() != param_names.len() {
                return Err(AppError::fit(format!(
                    "Chain {c}: {} posterior columns for {} parameters.",
                    post.ncols(),
                    param_names.len()
                )));
            }
            if post.nrows() != ll.nrows() {
                return Err(AppError::fit(format!(
                    "Chain {c}: {} posterior draws but {} log-likelihood draws.",
                    post.nrows(),
                    ll.nrows()
                )));
            }
            if ll.ncols() != n_obs {
                return Err(AppError::fit(format!(
                    "Chain {c}: log-likelihood covers {} observations, data has {n_obs}.",
                    ll.ncols()
                )));
            }
            if let Some(pos) = ll.iter().position(|v| !v.is_finite()) {
                // Column-major storage: position -> (draw, observation).
                let (draw, obs) = (pos % ll.nrows(), pos / ll.nrows());
                return Err(AppError::fit(format!(
                    "Chain {c}: log-likelihood of observation {obs} at draw {draw} is {}.",
                    ll[(draw, obs)]
                )));
            }
        }
        for (i, rep) in posterior_predictive.iter().enumerate() {
            if rep.rt.len() != n_obs || rep.response.len() != n_obs {
                return Err(AppError::fit(format!(
                    "Posterior predictive replicate {i} does not match the data size."
                )));
            }
        }

        let rhat = (0..param_names.len())
            .map(|j| {
                let traces: Vec<Vec<f64>> = posterior
                    .iter()
                    .map(|m| m.column(j).iter().copied().collect())
                    .collect();
                split_rhat(&traces)
            })
            .collect();

        Ok(Self {
            param_names,
            posterior,
            log_likelihood,
            posterior_predictive,
            observed_rt,
            observed_response,
            rhat,
        })
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn posterior(&self) -> &[DMatrix<f64>] {
        &self.posterior
    }

    pub fn log_likelihood(&self) -> &[DMatrix<f64>] {
        &self.log_likelihood
    }

    pub fn posterior_predictive(&self) -> &[PredictiveDraw] {
        &self.posterior_predictive
    }

    pub fn n_chains(&self) -> usize {
        self.posterior.len()
    }

    /// Draws across all chains.
    pub fn n_draws(&self) -> usize {
        self.posterior.iter().map(|m| m.nrows()).sum()
    }

    pub fn n_obs(&self) -> usize {
        self.observed_rt.len()
    }

    /// Split-R̂ per parameter, in `param_names` order (`NaN` when undefined).
    pub fn rhat(&self) -> &[f64] {
        &self.rhat
    }

    /// Log-likelihood with all chains stacked: (total draws) × observations.
    pub fn pooled_log_likelihood(&self) -> DMatrix<f64> {
        let mut out = DMatrix::<f64>::zeros(self.n_draws(), self.n_obs());
        let mut row = 0;
        for chain in &self.log_likelihood {
            out.rows_mut(row, chain.nrows()).copy_from(chain);
            row += chain.nrows();
        }
        out
    }

    /// Compare simple statistics of the data with the predictive replicates.
    pub fn predictive_check(&self) -> Option<PredictiveCheck> {
        if self.posterior_predictive.is_empty() || self.observed_rt.is_empty() {
            return None;
        }
        let pred_rt: Vec<f64> = self
            .posterior_predictive
            .iter()
            .map(|r| stats::mean(&r.rt))
            .collect();
        let pred_upper: Vec<f64> = self
            .posterior_predictive
            .iter()
            .map(|r| upper_rate(&r.response))
            .collect();
        Some(PredictiveCheck {
            observed_mean_rt: stats::mean(&self.observed_rt),
            predicted_mean_rt: stats::mean(&pred_rt),
            observed_upper_rate: upper_rate(&self.observed_response),
            predicted_upper_rate: stats::mean(&pred_upper),
        })
    }
}

/// Convert a fitted model into an `InferenceSummary`.
///
/// Pointwise log-likelihoods are re-evaluated at every retained draw; the
/// posterior predictive uses `config.ppc_draws` draws picked uniformly at
/// random (seeded) across all chains.
pub fn to_inference_summary(
    fitted: &FittedModel,
    dataset: &Dataset,
    config: &RunConfig,
) -> Result<InferenceSummary, AppError> {
    let model = fitted.model();
    if model.n_obs() != dataset.len() {
        return Err(AppError::fit(format!(
            "Model was compiled for {} trials, dataset has {}.",
            model.n_obs(),
            dataset.len()
        )));
    }

    let log_likelihood: Vec<DMatrix<f64>> = fitted
        .chains()
        .par_iter()
        .map(|chain| pointwise_matrix(model, &chain.draws))
        .collect();

    let posterior_predictive = posterior_predictive(fitted, config);

    InferenceSummary::new(
        model.param_names().to_vec(),
        fitted.chains().iter().map(|c| c.draws.clone()).collect(),
        log_likelihood,
        posterior_predictive,
        dataset.trials().iter().map(|t| t.rt).collect(),
        dataset.trials().iter().map(|t| t.response).collect(),
    )
}

fn pointwise_matrix(model: &CompiledModel, draws: &DMatrix<f64>) -> DMatrix<f64> {
    let n_obs = model.n_obs();
    let mut out = DMatrix::<f64>::zeros(draws.nrows(), n_obs);
    let mut buf = vec![0.0; n_obs];
    for i in 0..draws.nrows() {
        let theta: Vec<f64> = draws.row(i).iter().copied().collect();
        model.pointwise_log_likelihood(&theta, &mut buf);
        for (j, &v) in buf.iter().enumerate() {
            out[(i, j)] = v;
        }
    }
    out
}

fn posterior_predictive(fitted: &FittedModel, config: &RunConfig) -> Vec<PredictiveDraw> {
    let total = fitted.total_draws();
    let amount = config.ppc_draws.min(total);
    if amount == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(derive_seed(config.seed, "posterior-predictive"));
    let mut picks = index::sample(&mut rng, total, amount).into_vec();
    picks.sort_unstable();

    let mut out = Vec::with_capacity(amount);
    for pick in picks {
        let (chain, draw) = locate(fitted, pick);
        let theta = fitted.chains()[chain].draw(draw);
        let (rt, response) = fitted.model().simulate(&theta, &mut rng);
        out.push(PredictiveDraw {
            chain,
            draw,
            rt,
            response,
        });
    }
    out
}

/// Map a pooled draw index to `(chain, draw)`.
fn locate(fitted: &FittedModel, mut pooled: usize) -> (usize, usize) {
    for (c, chain) in fitted.chains().iter().enumerate() {
        if pooled < chain.len() {
            return (c, pooled);
        }
        pooled -= chain.len();
    }
    (fitted.chains().len() - 1, 0)
}

fn upper_rate(response: &[u8]) -> f64 {
    if response.is_empty() {
        return f64::NAN;
    }
    response.iter().map(|&r| f64::from(r)).sum::<f64>() / response.len() as f64
}
