//! Adaptive random-walk Metropolis for one chain.
//!
//! All parameters move jointly with a diagonal Gaussian proposal. During
//! burn-in the proposal is tuned every `ADAPT_WINDOW` iterations:
//!
//! - the per-parameter step follows the spread of the draws in the last window
//!   (only when the window accepted enough moves to measure it)
//! - a global scale is nudged towards `TARGET_ACCEPT`
//!
//! After burn-in the proposal is frozen, so the retained draws come from a
//! proper Markov chain.

use log::debug;
use nalgebra::DMatrix;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, StandardNormal};

use crate::domain::RunConfig;
use crate::error::AppError;
use crate::math::stats::Welford;
use crate::models::CompiledModel;

const ADAPT_WINDOW: usize = 50;
const TARGET_ACCEPT: f64 = 0.234;
const ADAPT_GAIN: f64 = 3.0;
const MIN_WINDOW_ACCEPTS: usize = 5;
const INITIAL_STEP: f64 = 0.1;
const MIN_STEP: f64 = 1e-4;
const INIT_JITTER: f64 = 0.1;
const MAX_INIT_ATTEMPTS: usize = 100;

/// Retained output of one chain.
#[derive(Debug, Clone)]
pub struct ChainTrace {
    /// Kept draws (rows) by parameter (columns), unconstrained scale.
    pub draws: DMatrix<f64>,
    /// Deviance (`-2 · log-likelihood`) of each kept draw.
    pub deviance: Vec<f64>,
    /// Share of accepted proposals after burn-in.
    pub acceptance_rate: f64,
}

impl ChainTrace {
    pub fn len(&self) -> usize {
        self.draws.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.nrows() == 0
    }

    pub fn draw(&self, i: usize) -> Vec<f64> {
        self.draws.row(i).iter().copied().collect()
    }
}

/// Current position of the chain.
struct State {
    theta: Vec<f64>,
    log_lik: f64,
    log_prior: f64,
}

impl State {
    fn evaluate(model: &CompiledModel, theta: Vec<f64>) -> Option<Self> {
        let log_prior = model.log_prior(&theta);
        if !log_prior.is_finite() {
            return None;
        }
        let log_lik = model.log_likelihood(&theta);
        if !log_lik.is_finite() {
            return None;
        }
        Some(Self {
            theta,
            log_lik,
            log_prior,
        })
    }

    fn log_post(&self) -> f64 {
        self.log_lik + self.log_prior
    }
}

/// Run one chain of `config.samples` iterations, keeping every `thin`-th draw
/// after `config.burn`.
pub fn run_chain(
    model: &CompiledModel,
    config: &RunConfig,
    chain: usize,
    seed: u64,
) -> Result<ChainTrace, AppError> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(seed);
    let dim = model.dim();
    let mut state = starting_state(model, &mut rng)?;

    let mut step = vec![INITIAL_STEP; dim];
    let mut log_scale = (2.38 / (dim as f64).sqrt()).ln();
    let mut window = vec![Welford::default(); dim];
    let mut window_accepts = 0usize;

    let kept = config.kept_per_chain();
    let mut draws = DMatrix::<f64>::zeros(kept, dim);
    let mut deviance = Vec::with_capacity(kept);
    let mut accepted_after_burn = 0usize;
    let mut proposal = vec![0.0; dim];

    for iter in 0..config.samples {
        let scale = log_scale.exp();
        for (j, slot) in proposal.iter_mut().enumerate() {
            let z: f64 = StandardNormal.sample(&mut rng);
            *slot = state.theta[j] + scale * step[j] * z;
        }

        let accepted = match State::evaluate(model, proposal.clone()) {
            Some(candidate) => {
                let log_alpha = candidate.log_post() - state.log_post();
                let u: f64 = rng.gen_range(0.0..1.0);
                if u.ln() < log_alpha {
                    state = candidate;
                    true
                } else {
                    false
                }
            }
            None => false,
        };

        if iter < config.burn {
            window_accepts += usize::from(accepted);
            for (acc, &x) in window.iter_mut().zip(&state.theta) {
                acc.push(x);
            }
            if (iter + 1) % ADAPT_WINDOW == 0 {
                let rate = window_accepts as f64 / ADAPT_WINDOW as f64;
                if window_accepts >= MIN_WINDOW_ACCEPTS {
                    for (s, acc) in step.iter_mut().zip(&window) {
                        let sd = acc.variance().sqrt();
                        if sd.is_finite() {
                            *s = sd.max(MIN_STEP);
                        }
                    }
                }
                log_scale += ADAPT_GAIN * (rate - TARGET_ACCEPT);
                debug!(
                    "chain {chain}: iter {} acceptance {:.3} scale {:.4}",
                    iter + 1,
                    rate,
                    log_scale.exp()
                );
                window = vec![Welford::default(); dim];
                window_accepts = 0;
            }
            continue;
        }

        accepted_after_burn += usize::from(accepted);
        let since_burn = iter - config.burn;
        if since_burn % config.thin == 0 {
            let row = since_burn / config.thin;
            for (j, &x) in state.theta.iter().enumerate() {
                draws[(row, j)] = x;
            }
            deviance.push(-2.0 * state.log_lik);
        }
    }

    let acceptance_rate = accepted_after_burn as f64 / (config.samples - config.burn) as f64;
    debug!("chain {chain}: kept {kept} draws, acceptance {acceptance_rate:.3}");

    Ok(ChainTrace {
        draws,
        deviance,
        acceptance_rate,
    })
}

/// Jitter the model's starting point; fall back to it unchanged.
fn starting_state(model: &CompiledModel, rng: &mut StdRng) -> Result<State, AppError> {
    let base = model.initial_point();
    let jitter = Normal::new(0.0, INIT_JITTER)
        .map_err(|e| AppError::fit(format!("Invalid jitter distribution: {e}")))?;

    for _ in 0..MAX_INIT_ATTEMPTS {
        let theta: Vec<f64> = base.iter().map(|&x| x + jitter.sample(rng)).collect();
        if let Some(state) = State::evaluate(model, theta) {
            return Ok(state);
        }
    }

    State::evaluate(model, base).ok_or_else(|| {
        AppError::fit("Sampler could not find a starting point with finite posterior density.")
    })
}
