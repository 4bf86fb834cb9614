//! Synthetic trial generation from a known candidate.
//!
//! This is the "generate" half of a model-recovery study: simulate a dataset
//! from `ms#` with fixed true parameters, then check which candidate the
//! comparison tables prefer.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{Dataset, ModelKey, Trial};
use crate::error::AppError;
use crate::math::wiener::{DdmParams, simulate};
use crate::models::STARTING_POINT;

/// Condition labels, in the order trials alternate between them.
pub const CONDITIONS: [&str; 2] = ["HC", "LC"];

/// Drift in the low-confidence condition (and when drift is shared).
const V_BASE: f64 = 1.0;
/// Added to the drift in the high-confidence condition.
const V_HC_SHIFT: f64 = 0.6;
const A_BASE: f64 = 1.5;
const A_HC: f64 = 1.9;
const T_BASE: f64 = 0.3;
const T_HC: f64 = 0.4;
/// Spread of the per-subject drift offsets.
const SUBJECT_SD: f64 = 0.3;

/// True parameters of `model` for one condition, before subject offsets.
pub fn true_params(model: ModelKey, condition: &str) -> DdmParams {
    let spec = model.spec();
    let hc = condition == CONDITIONS[0];
    DdmParams {
        v: if spec.v_by_condition && hc {
            V_BASE + V_HC_SHIFT
        } else {
            V_BASE
        },
        a: if spec.a_by_condition && hc { A_HC } else { A_BASE },
        w: STARTING_POINT,
        t: if spec.t_by_condition && hc { T_HC } else { T_BASE },
    }
}

/// Simulate `subjects × trials_per_subject` trials from `model`.
///
/// Subjects are numbered from 0 and trials alternate between the two
/// conditions. With two or more subjects each subject gets a drift offset
/// drawn from `N(0, 0.3)`.
pub fn simulate_dataset(
    model: ModelKey,
    subjects: usize,
    trials_per_subject: usize,
    seed: u64,
) -> Result<Dataset, AppError> {
    if subjects == 0 {
        return Err(AppError::data("Synthetic data needs at least one subject."));
    }
    if trials_per_subject == 0 {
        return Err(AppError::data("Synthetic data needs at least one trial per subject."));
    }
    let subject_count = u32::try_from(subjects)
        .map_err(|_| AppError::data(format!("Too many subjects: {subjects}.")))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let offset_dist = Normal::new(0.0, SUBJECT_SD)
        .map_err(|e| AppError::data(format!("Subject offset distribution error: {e}")))?;

    let mut trials = Vec::with_capacity(subjects * trials_per_subject);
    for subject in 0..subject_count {
        let offset = if subjects >= 2 {
            offset_dist.sample(&mut rng)
        } else {
            0.0
        };
        for i in 0..trials_per_subject {
            let condition = CONDITIONS[i % CONDITIONS.len()];
            let mut params = true_params(model, condition);
            params.v += offset;
            let (rt, upper) = simulate(&params, &mut rng);
            trials.push(Trial {
                subject,
                rt,
                response: u8::from(upper),
                condition: condition.to_string(),
            });
        }
    }

    Dataset::new(trials)
}
