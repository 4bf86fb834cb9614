//! Hierarchical DDM candidates compiled against a dataset.
//!
//! A `CompiledModel` fixes the parameter layout of one `DdmSpec` for one
//! dataset and precomputes, per trial, which parameter slots it reads. The
//! sampler then only ever sees a flat `&[f64]` on the unconstrained scale:
//!
//! - `v` / `v(<cond>)`: drift rate
//! - `log_a` / `log_a(<cond>)`: log boundary separation
//! - `log_t` / `log_t(<cond>)`: log non-decision time
//! - `v_subj[<id>]`: per-subject drift offset (only with 2+ subjects)
//! - `log_v_subj_sd`: log scale of the subject offsets
//!
//! The starting point `w` is fixed at 0.5.

use rand::Rng;
use statrs::distribution::{Continuous, Normal};

use crate::domain::{Dataset, DdmSpec};
use crate::error::AppError;
use crate::math::wiener::{self, DdmParams};

/// Relative starting point shared by every candidate.
pub const STARTING_POINT: f64 = 0.5;

const V_PRIOR: (f64, f64) = (1.0, 2.0);
const LOG_A_PRIOR: (f64, f64) = (0.405_465_108, 0.5); // ln 1.5
const LOG_T_PRIOR: (f64, f64) = (-1.203_972_804, 0.5); // ln 0.3
const LOG_SUBJ_SD_PRIOR: (f64, f64) = (-0.693_147_181, 1.0); // ln 0.5

/// Parameter slots one trial reads.
#[derive(Debug, Clone, Copy)]
struct TrialSlots {
    rt: f64,
    upper: bool,
    v: usize,
    a: usize,
    t: usize,
    subject: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct SubjectBlock {
    start: usize,
    len: usize,
    sd: usize,
}

#[derive(Debug, Clone)]
pub struct CompiledModel {
    spec: DdmSpec,
    names: Vec<String>,
    /// Fixed priors; `None` for subject offsets (their scale is a parameter).
    priors: Vec<Option<Normal>>,
    trials: Vec<TrialSlots>,
    subjects: Option<SubjectBlock>,
    init: Vec<f64>,
}

impl CompiledModel {
    pub fn new(spec: DdmSpec, dataset: &Dataset) -> Result<Self, AppError> {
        let mut layout = Layout::default();
        let conditions = dataset.conditions();

        let v_slots = layout.group("v", spec.v_by_condition, conditions, V_PRIOR, 0.0)?;

        // Initialize log_t below the fastest response of each cell so the
        // starting point has finite likelihood.
        let mut min_rt = vec![f64::INFINITY; conditions.len()];
        for trial in dataset.trials() {
            if let Some(c) = dataset.condition_index(&trial.condition) {
                min_rt[c] = min_rt[c].min(trial.rt);
            }
        }
        let overall_min = min_rt.iter().copied().fold(f64::INFINITY, f64::min);
        let a_slots = layout.group(
            "log_a",
            spec.a_by_condition,
            conditions,
            LOG_A_PRIOR,
            LOG_A_PRIOR.0,
        )?;
        let t_slots = layout.group(
            "log_t",
            spec.t_by_condition,
            conditions,
            LOG_T_PRIOR,
            initial_log_t(overall_min),
        )?;
        if spec.t_by_condition {
            for (slot, &m) in t_slots.iter().zip(&min_rt) {
                layout.init[*slot] = initial_log_t(m);
            }
        }

        let subjects = if dataset.subjects().len() > 1 {
            let start = layout.names.len();
            for id in dataset.subjects() {
                layout.names.push(format!("v_subj[{id}]"));
                layout.priors.push(None);
                layout.init.push(0.0);
            }
            let sd = layout.push("log_v_subj_sd".to_string(), LOG_SUBJ_SD_PRIOR, LOG_SUBJ_SD_PRIOR.0)?;
            Some(SubjectBlock {
                start,
                len: dataset.subjects().len(),
                sd,
            })
        } else {
            None
        };

        let mut trials = Vec::with_capacity(dataset.len());
        for (i, trial) in dataset.trials().iter().enumerate() {
            let c = dataset.condition_index(&trial.condition).ok_or_else(|| {
                AppError::fit(format!("Trial {i}: unknown condition '{}'.", trial.condition))
            })?;
            let subject = match subjects {
                Some(block) => {
                    let s = dataset.subject_index(trial.subject).ok_or_else(|| {
                        AppError::fit(format!("Trial {i}: unknown subject {}.", trial.subject))
                    })?;
                    Some(block.start + s)
                }
                None => None,
            };
            trials.push(TrialSlots {
                rt: trial.rt,
                upper: trial.response == 1,
                v: pick(&v_slots, c),
                a: pick(&a_slots, c),
                t: pick(&t_slots, c),
                subject,
            });
        }

        Ok(Self {
            spec,
            names: layout.names,
            priors: layout.priors,
            trials,
            subjects,
            init: layout.init,
        })
    }

    pub fn spec(&self) -> DdmSpec {
        self.spec
    }

    /// Number of free parameters.
    pub fn dim(&self) -> usize {
        self.names.len()
    }

    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    pub fn n_obs(&self) -> usize {
        self.trials.len()
    }

    /// Deterministic starting point with finite log posterior.
    pub fn initial_point(&self) -> Vec<f64> {
        self.init.clone()
    }

    /// Natural-scale DDM parameters seen by trial `i`.
    pub fn trial_params(&self, theta: &[f64], i: usize) -> DdmParams {
        let slots = &self.trials[i];
        let offset = slots.subject.map_or(0.0, |s| theta[s]);
        DdmParams {
            v: theta[slots.v] + offset,
            a: theta[slots.a].exp(),
            w: STARTING_POINT,
            t: theta[slots.t].exp(),
        }
    }

    pub fn log_prior(&self, theta: &[f64]) -> f64 {
        let mut lp = 0.0;
        for (x, prior) in theta.iter().zip(&self.priors) {
            if let Some(prior) = prior {
                lp += prior.ln_pdf(*x);
            }
        }
        if let Some(block) = self.subjects {
            let Ok(offsets) = Normal::new(0.0, theta[block.sd].exp()) else {
                return f64::NEG_INFINITY;
            };
            for &u in &theta[block.start..block.start + block.len] {
                lp += offsets.ln_pdf(u);
            }
        }
        lp
    }

    /// Log-likelihood of every trial at `theta`, written into `out`.
    pub fn pointwise_log_likelihood(&self, theta: &[f64], out: &mut [f64]) {
        for (i, slot) in out.iter_mut().enumerate() {
            let p = self.trial_params(theta, i);
            *slot = wiener::log_pdf(self.trials[i].rt, self.trials[i].upper, &p);
        }
    }

    /// Total log-likelihood; stops early once a trial is impossible.
    pub fn log_likelihood(&self, theta: &[f64]) -> f64 {
        let mut ll = 0.0;
        for (i, trial) in self.trials.iter().enumerate() {
            let p = self.trial_params(theta, i);
            let lp = wiener::log_pdf(trial.rt, trial.upper, &p);
            if lp == f64::NEG_INFINITY {
                return f64::NEG_INFINITY;
            }
            ll += lp;
        }
        ll
    }

    /// `-2 · log-likelihood`.
    pub fn deviance(&self, theta: &[f64]) -> f64 {
        -2.0 * self.log_likelihood(theta)
    }

    /// Simulate responses for every trial at `theta`.
    pub fn simulate<R: Rng + ?Sized>(&self, theta: &[f64], rng: &mut R) -> (Vec<f64>, Vec<u8>) {
        let mut rt = Vec::with_capacity(self.trials.len());
        let mut response = Vec::with_capacity(self.trials.len());
        for i in 0..self.trials.len() {
            let p = self.trial_params(theta, i);
            let (x, upper) = wiener::simulate(&p, rng);
            rt.push(x);
            response.push(u8::from(upper));
        }
        (rt, response)
    }
}

#[derive(Default)]
struct Layout {
    names: Vec<String>,
    priors: Vec<Option<Normal>>,
    init: Vec<f64>,
}

impl Layout {
    fn push(&mut self, name: String, prior: (f64, f64), init: f64) -> Result<usize, AppError> {
        let dist = Normal::new(prior.0, prior.1)
            .map_err(|e| AppError::fit(format!("Invalid prior for {name}: {e}")))?;
        self.names.push(name);
        self.priors.push(Some(dist));
        self.init.push(init);
        Ok(self.names.len() - 1)
    }

    /// Add one slot, or one slot per condition.
    fn group(
        &mut self,
        name: &str,
        by_condition: bool,
        conditions: &[String],
        prior: (f64, f64),
        init: f64,
    ) -> Result<Vec<usize>, AppError> {
        if by_condition {
            conditions
                .iter()
                .map(|c| self.push(format!("{name}({c})"), prior, init))
                .collect()
        } else {
            Ok(vec![self.push(name.to_string(), prior, init)?])
        }
    }
}

fn pick(slots: &[usize], condition: usize) -> usize {
    if slots.len() == 1 { slots[0] } else { slots[condition] }
}

fn initial_log_t(min_rt: f64) -> f64 {
    if min_rt.is_finite() {
        (0.5 * min_rt).min(0.3).ln()
    } else {
        LOG_T_PRIOR.0
    }
}
