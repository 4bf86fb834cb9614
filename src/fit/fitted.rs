//! Fitted candidates and chain aggregation.

use std::sync::Arc;

use nalgebra::DMatrix;

use crate::error::AppError;
use crate::fit::sampler::ChainTrace;
use crate::math::stats;
use crate::models::CompiledModel;

/// Result of fitting one candidate: its compiled likelihood plus every chain.
#[derive(Debug, Clone)]
pub struct FittedModel {
    model: Arc<CompiledModel>,
    chains: Vec<ChainTrace>,
}

impl FittedModel {
    pub fn new(model: Arc<CompiledModel>, chains: Vec<ChainTrace>) -> Result<Self, AppError> {
        if chains.is_empty() {
            return Err(AppError::fit("Fitted model has no chains."));
        }
        let dim = model.dim();
        for (c, chain) in chains.iter().enumerate() {
            if chain.draws.ncols() != dim {
                return Err(AppError::fit(format!(
                    "Chain {c} has {} parameters, model declares {dim}.",
                    chain.draws.ncols()
                )));
            }
            if chain.deviance.len() != chain.len() {
                return Err(AppError::fit(format!(
                    "Chain {c} has {} draws but {} deviance values.",
                    chain.len(),
                    chain.deviance.len()
                )));
            }
        }
        Ok(Self { model, chains })
    }

    pub fn model(&self) -> &CompiledModel {
        &self.model
    }

    pub fn chains(&self) -> &[ChainTrace] {
        &self.chains
    }

    pub fn total_draws(&self) -> usize {
        self.chains.iter().map(ChainTrace::len).sum()
    }

    pub fn mean_acceptance(&self) -> f64 {
        let rates: Vec<f64> = self.chains.iter().map(|c| c.acceptance_rate).collect();
        stats::mean(&rates)
    }

    /// Pool every chain into one model and compute its DIC.
    ///
    /// `d_bar` is the mean deviance over pooled draws and `d_hat` the deviance
    /// at the pooled posterior mean (sampler scale), so
    /// `dic = d_bar + (d_bar - d_hat)`.
    pub fn concat_chains(&self) -> Result<CombinedModel, AppError> {
        let total = self.total_draws();
        if total == 0 {
            return Err(AppError::comparison("Cannot compute DIC from zero draws."));
        }
        let dim = self.model.dim();

        let mut draws = DMatrix::<f64>::zeros(total, dim);
        let mut deviance = Vec::with_capacity(total);
        let mut row = 0;
        for chain in &self.chains {
            for i in 0..chain.len() {
                draws.row_mut(row).copy_from(&chain.draws.row(i));
                row += 1;
            }
            deviance.extend_from_slice(&chain.deviance);
        }

        let posterior_mean: Vec<f64> = (0..dim).map(|j| draws.column(j).mean()).collect();
        let d_bar = stats::mean(&deviance);
        let d_hat = self.model.deviance(&posterior_mean);
        if !(d_bar.is_finite() && d_hat.is_finite()) {
            return Err(AppError::comparison(format!(
                "DIC undefined: mean deviance {d_bar}, deviance at posterior mean {d_hat}."
            )));
        }

        let p_d = d_bar - d_hat;
        Ok(CombinedModel {
            draws,
            deviance,
            d_bar,
            d_hat,
            p_d,
            dic: d_bar + p_d,
        })
    }
}

/// All chains of one candidate pooled together.
#[derive(Debug, Clone)]
pub struct CombinedModel {
    pub draws: DMatrix<f64>,
    pub deviance: Vec<f64>,
    pub d_bar: f64,
    pub d_hat: f64,
    /// Effective number of parameters.
    pub p_d: f64,
    pub dic: f64,
}
