//! Pointwise information criteria: PSIS-LOO and WAIC.

use nalgebra::DMatrix;

use crate::compare::psis::{k_threshold, psis_smooth};
use crate::error::AppError;
use crate::math::stats::{logsumexp, variance};

/// WAIC is flagged unreliable when any pointwise variance exceeds this.
const WAIC_VAR_WARN: f64 = 0.4;

/// One criterion evaluated for one candidate, on the log (elpd) scale.
#[derive(Debug, Clone, PartialEq)]
pub struct IcEstimate {
    pub elpd: f64,
    /// Effective number of parameters.
    pub p: f64,
    pub se: f64,
    /// Per-observation contribution to `elpd`.
    pub pointwise: Vec<f64>,
    pub warning: bool,
    /// Pareto shape per observation (LOO only).
    pub pareto_k: Option<Vec<f64>>,
}

/// PSIS leave-one-out cross-validation over a (draws × observations)
/// log-likelihood matrix.
pub fn loo(log_lik: &DMatrix<f64>) -> Result<IcEstimate, AppError> {
    let (s, n) = check_shape(log_lik)?;
    let ln_s = (s as f64).ln();

    let mut pointwise = Vec::with_capacity(n);
    let mut ks = Vec::with_capacity(n);
    let mut lppd = 0.0;
    let mut column = vec![0.0; s];
    let mut log_weights = vec![0.0; s];
    for i in 0..n {
        column
            .iter_mut()
            .zip(log_lik.column(i).iter())
            .for_each(|(c, &v)| *c = v);
        lppd += logsumexp(&column) - ln_s;

        for (w, &ll) in log_weights.iter_mut().zip(&column) {
            *w = -ll;
        }
        let k = psis_smooth(&mut log_weights);
        let terms: Vec<f64> = log_weights.iter().zip(&column).map(|(w, ll)| w + ll).collect();
        pointwise.push(logsumexp(&terms));
        ks.push(k);
    }

    ensure_finite("LOO", &pointwise)?;
    let elpd: f64 = pointwise.iter().sum();
    let threshold = k_threshold(s);
    Ok(IcEstimate {
        elpd,
        p: lppd - elpd,
        se: (n as f64 * variance(&pointwise, 0)).sqrt(),
        warning: ks.iter().any(|&k| k > threshold),
        pointwise,
        pareto_k: Some(ks),
    })
}

/// Widely applicable information criterion.
pub fn waic(log_lik: &DMatrix<f64>) -> Result<IcEstimate, AppError> {
    let (s, n) = check_shape(log_lik)?;
    let ln_s = (s as f64).ln();

    let mut pointwise = Vec::with_capacity(n);
    let mut p_total = 0.0;
    let mut warning = false;
    for i in 0..n {
        let column: Vec<f64> = log_lik.column(i).iter().copied().collect();
        let lppd_i = logsumexp(&column) - ln_s;
        let p_i = variance(&column, 0);
        warning |= p_i > WAIC_VAR_WARN;
        p_total += p_i;
        pointwise.push(lppd_i - p_i);
    }

    ensure_finite("WAIC", &pointwise)?;
    Ok(IcEstimate {
        elpd: pointwise.iter().sum(),
        p: p_total,
        se: (n as f64 * variance(&pointwise, 0)).sqrt(),
        pointwise,
        warning,
        pareto_k: None,
    })
}

fn check_shape(log_lik: &DMatrix<f64>) -> Result<(usize, usize), AppError> {
    let (s, n) = log_lik.shape();
    if s < 2 {
        return Err(AppError::comparison(format!(
            "Need at least 2 posterior draws for pointwise criteria, got {s}."
        )));
    }
    if n == 0 {
        return Err(AppError::comparison("Log-likelihood has no observations."));
    }
    Ok((s, n))
}

fn ensure_finite(name: &str, pointwise: &[f64]) -> Result<(), AppError> {
    match pointwise.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(AppError::comparison(format!(
            "{name} is undefined: observation {i} has pointwise value {}.",
            pointwise[i]
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Log-likelihood of y_i ~ N(mu_s, 1) for draws mu_s around 0.
    fn normal_log_lik(draws: usize, obs: &[f64]) -> DMatrix<f64> {
        DMatrix::from_fn(draws, obs.len(), |s, i| {
            let mu = 0.2 * ((s as f64 + 0.5) / draws as f64 - 0.5);
            -0.5 * (obs[i] - mu).powi(2) - 0.5 * (2.0 * std::f64::consts::PI).ln()
        })
    }

    #[test]
    fn constant_log_lik_has_no_penalty() {
        let ll = DMatrix::from_element(100, 5, -1.2);
        let w = waic(&ll).unwrap();
        assert_relative_eq!(w.elpd, -6.0, epsilon = 1e-9);
        assert_relative_eq!(w.p, 0.0, epsilon = 1e-12);
        assert_relative_eq!(w.se, 0.0, epsilon = 1e-12);

        let l = loo(&ll).unwrap();
        assert_relative_eq!(l.elpd, -6.0, epsilon = 1e-9);
        assert_relative_eq!(l.p, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn loo_and_waic_agree_on_well_behaved_posteriors() {
        let obs = [-0.5, 0.1, 0.3, 1.2, -1.0, 0.0, 0.7];
        let ll = normal_log_lik(400, &obs);
        let l = loo(&ll).unwrap();
        let w = waic(&ll).unwrap();
        assert!(l.elpd < 0.0);
        assert_relative_eq!(l.elpd, w.elpd, epsilon = 0.05);
        assert!(l.p > 0.0 && w.p > 0.0);
        assert_eq!(l.pointwise.len(), obs.len());
        assert_eq!(l.pareto_k.as_ref().map(Vec::len), Some(obs.len()));
    }

    #[test]
    fn waic_warns_on_high_pointwise_variance() {
        let ll = DMatrix::from_fn(50, 2, |s, i| if i == 0 { -1.0 } else { -3.0 * (s % 2) as f64 });
        let w = waic(&ll).unwrap();
        assert!(w.warning);
    }

    #[test]
    fn waic_penalty_is_population_variance() {
        // Per observation: draws alternate -1, -3, so the variance is 1.
        let ll = DMatrix::from_fn(4, 2, |s, _| if s % 2 == 0 { -1.0 } else { -3.0 });
        let w = waic(&ll).unwrap();
        assert_relative_eq!(w.p, 2.0, epsilon = 1e-12);
        assert!(w.warning);
    }

    #[test]
    fn rejects_non_finite_values() {
        let mut ll = DMatrix::from_element(10, 3, -1.0);
        for s in 0..10 {
            ll[(s, 1)] = f64::NEG_INFINITY;
        }
        let err = waic(&ll).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_COMPARISON);
        assert!(loo(&ll).is_err());
    }

    #[test]
    fn rejects_single_draw() {
        let ll = DMatrix::from_element(1, 3, -1.0);
        assert!(loo(&ll).is_err());
    }
}
