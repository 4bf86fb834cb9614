//! Model weights for LOO/WAIC tables.

use crate::domain::WeightMethod;

const STACKING_MAX_ITER: usize = 10_000;
const STACKING_TOL: f64 = 1e-10;

/// One weight per candidate, in input order, summing to 1.
///
/// Each element of `pointwise` holds one candidate's per-observation elpd
/// contributions; `elpd` holds their sums.
pub fn model_weights(method: WeightMethod, pointwise: &[&[f64]], elpd: &[f64]) -> Vec<f64> {
    match method {
        WeightMethod::Stacking => stacking(pointwise),
        WeightMethod::PseudoBma => pseudo_bma(elpd),
    }
}

/// `w ∝ exp(elpd - max elpd)`.
pub fn pseudo_bma(elpd: &[f64]) -> Vec<f64> {
    let max = elpd.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let raw: Vec<f64> = elpd.iter().map(|&e| (e - max).exp()).collect();
    normalize(raw)
}

/// Stacking of predictive distributions: maximize
/// `Σ_i log Σ_k w_k exp(p_ik)` over the simplex with the EM fixed point
/// `w_k ← w_k · mean_i(e_ik / Σ_j w_j e_ij)`.
pub fn stacking(pointwise: &[&[f64]]) -> Vec<f64> {
    let k = pointwise.len();
    if k == 0 {
        return Vec::new();
    }
    if k == 1 {
        return vec![1.0];
    }
    let n = pointwise.iter().map(|p| p.len()).min().unwrap_or(0);
    if n == 0 {
        return vec![1.0 / k as f64; k];
    }

    // Per-observation scaling keeps exp() in range; it cancels in the ratio.
    let exp_rows: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let max = pointwise
                .iter()
                .map(|p| p[i])
                .fold(f64::NEG_INFINITY, f64::max);
            pointwise.iter().map(|p| (p[i] - max).exp()).collect()
        })
        .collect();

    let mut w = vec![1.0 / k as f64; k];
    for _ in 0..STACKING_MAX_ITER {
        let mut next = vec![0.0; k];
        for row in &exp_rows {
            let mix: f64 = row.iter().zip(&w).map(|(e, wk)| e * wk).sum();
            if mix > 0.0 {
                for (nk, (e, wk)) in next.iter_mut().zip(row.iter().zip(&w)) {
                    *nk += e * wk / mix;
                }
            }
        }
        let next = normalize(next);
        let delta = next
            .iter()
            .zip(&w)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        w = next;
        if delta < STACKING_TOL {
            break;
        }
    }
    w
}

fn normalize(mut raw: Vec<f64>) -> Vec<f64> {
    let total: f64 = raw.iter().sum();
    if total > 0.0 && total.is_finite() {
        raw.iter_mut().for_each(|x| *x /= total);
    } else {
        let uniform = 1.0 / raw.len().max(1) as f64;
        raw.iter_mut().for_each(|x| *x = uniform);
    }
    raw
}
