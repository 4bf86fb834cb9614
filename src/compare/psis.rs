//! Pareto-smoothed importance sampling (PSIS).
//!
//! For each left-out observation the raw importance ratios `1 / p(y_i | θ_s)`
//! are heavy-tailed. PSIS replaces the largest ratios with expected order
//! statistics of a generalized Pareto distribution fitted to the tail, and the
//! fitted shape `k` doubles as a reliability diagnostic.

use crate::math::stats::logsumexp;

/// Prior strength (pseudo-observations) for the shape estimate.
const PRIOR_K_WEIGHT: f64 = 10.0;
const PRIOR_K_CENTER: f64 = 0.5;

/// Smooth `log_ratios` in place and normalize them to log weights.
///
/// Returns the estimated Pareto shape `k` (`+inf` when the tail is too short
/// to fit).
pub fn psis_smooth(log_ratios: &mut [f64]) -> f64 {
    let n = log_ratios.len();
    if n == 0 {
        return f64::INFINITY;
    }

    let tail_len = tail_length(n);
    let max = log_ratios.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    for x in log_ratios.iter_mut() {
        *x -= max;
    }

    let mut sorted: Vec<f64> = log_ratios.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let cutoff_idx = n.saturating_sub(tail_len + 1);
    let cutoff = sorted[cutoff_idx].max(f64::MIN_POSITIVE.ln());
    let exp_cutoff = cutoff.exp();

    let mut tail: Vec<usize> = (0..n).filter(|&i| log_ratios[i] > cutoff).collect();
    let k = if tail.len() <= 4 {
        f64::INFINITY
    } else {
        tail.sort_by(|&a, &b| {
            log_ratios[a]
                .partial_cmp(&log_ratios[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let excess: Vec<f64> = tail
            .iter()
            .map(|&i| log_ratios[i].exp() - exp_cutoff)
            .collect();
        let (k, sigma) = gpd_fit(&excess);
        if k.is_finite() {
            let m = tail.len() as f64;
            for (rank, &i) in tail.iter().enumerate() {
                let p = (rank as f64 + 0.5) / m;
                let smoothed = (gpd_quantile(p, k, sigma) + exp_cutoff).ln();
                log_ratios[i] = smoothed.min(0.0);
            }
        }
        k
    };

    let norm = logsumexp(log_ratios);
    for x in log_ratios.iter_mut() {
        *x -= norm;
    }
    k
}

/// `ceil(min(0.2 S, 3 √S))` with relative efficiency 1.
fn tail_length(n: usize) -> usize {
    let nf = n as f64;
    (0.2 * nf).min(3.0 * nf.sqrt()).ceil() as usize
}

/// Generalized Pareto fit by Zhang & Stephens (2009) with a weakly
/// informative prior on `k`. `x` must be sorted ascending and positive.
///
/// Returns `(k, sigma)`.
pub fn gpd_fit(x: &[f64]) -> (f64, f64) {
    let n = x.len();
    if n == 0 {
        return (f64::INFINITY, f64::NAN);
    }
    let nf = n as f64;
    let m = 30 + (nf.sqrt() as usize);
    let quartile = x[((nf / 4.0 + 0.5) as usize).saturating_sub(1).min(n - 1)];
    let last = x[n - 1];
    if !(quartile > 0.0 && last > 0.0) {
        return (f64::INFINITY, f64::NAN);
    }

    let b: Vec<f64> = (1..=m)
        .map(|j| {
            let base = 1.0 - (m as f64 / (j as f64 - 0.5)).sqrt();
            base / (3.0 * quartile) + 1.0 / last
        })
        .collect();

    let k_of = |bj: f64| x.iter().map(|&xi| (-bj * xi).ln_1p()).sum::<f64>() / nf;
    let ks: Vec<f64> = b.iter().map(|&bj| k_of(bj)).collect();
    let profile: Vec<f64> = b
        .iter()
        .zip(&ks)
        .map(|(&bj, &kj)| nf * ((-bj / kj).ln() - kj - 1.0))
        .collect();

    // weight_j = 1 / Σ_i exp(profile_i - profile_j)
    let mut weights: Vec<f64> = profile
        .iter()
        .map(|&lj| 1.0 / profile.iter().map(|&li| (li - lj).exp()).sum::<f64>())
        .collect();
    let mut b_used: Vec<f64> = Vec::with_capacity(m);
    let mut w_used: Vec<f64> = Vec::with_capacity(m);
    for (w, &bj) in weights.drain(..).zip(&b) {
        if w.is_finite() && w >= 10.0 * f64::EPSILON {
            w_used.push(w);
            b_used.push(bj);
        }
    }
    let w_sum: f64 = w_used.iter().sum();
    if !(w_sum > 0.0) {
        return (f64::INFINITY, f64::NAN);
    }

    let b_post: f64 = b_used.iter().zip(&w_used).map(|(b, w)| b * w).sum::<f64>() / w_sum;
    let k_post = k_of(b_post);
    let sigma = -k_post / b_post;
    let k = (nf * k_post + PRIOR_K_WEIGHT * PRIOR_K_CENTER) / (nf + PRIOR_K_WEIGHT);
    (k, sigma)
}

/// Quantile function of the generalized Pareto distribution.
pub fn gpd_quantile(p: f64, k: f64, sigma: f64) -> f64 {
    if !(sigma > 0.0) || !(p > 0.0 && p < 1.0) {
        return f64::NAN;
    }
    if k.abs() < f64::EPSILON {
        -sigma * (-p).ln_1p()
    } else {
        sigma * (-k * (-p).ln_1p()).exp_m1() / k
    }
}

/// Largest `k` for which PSIS estimates are considered reliable with `s` draws.
pub fn k_threshold(s: usize) -> f64 {
    let sf = s as f64;
    if sf <= 1.0 {
        return 0.7;
    }
    (1.0 - 1.0 / sf.log10()).min(0.7)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn smoothed_weights_are_normalized() {
        let mut rng = StdRng::seed_from_u64(1);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut lw: Vec<f64> = (0..1000).map(|_| normal.sample(&mut rng)).collect();
        let k = psis_smooth(&mut lw);
        assert!(k.is_finite());
        assert!((logsumexp(&lw)).abs() < 1e-9);
    }

    #[test]
    fn light_tails_give_small_k() {
        let mut rng = StdRng::seed_from_u64(2);
        let normal = Normal::new(0.0, 0.1).unwrap();
        let mut lw: Vec<f64> = (0..2000).map(|_| normal.sample(&mut rng)).collect();
        let k = psis_smooth(&mut lw);
        assert!(k < 0.5, "k={k}");
    }

    #[test]
    fn heavy_tails_give_large_k() {
        // Log ratios from a Pareto(alpha = 1) variable: log X = Exp(1).
        let mut rng = StdRng::seed_from_u64(3);
        let exp = rand_distr::Exp::new(1.0).unwrap();
        let mut lw: Vec<f64> = (0..4000).map(|_| exp.sample(&mut rng)).collect();
        let k = psis_smooth(&mut lw);
        assert!(k > 0.7, "k={k}");
    }

    #[test]
    fn gpd_quantile_inverts_cdf() {
        let (k, sigma) = (0.3, 2.0);
        let x = gpd_quantile(0.4, k, sigma);
        let cdf = 1.0 - (1.0 + k * x / sigma).powf(-1.0 / k);
        assert!((cdf - 0.4).abs() < 1e-12);
        assert!(gpd_quantile(0.4, k, -1.0).is_nan());
    }

    #[test]
    fn threshold_caps_at_point_seven() {
        assert_eq!(k_threshold(4000), 0.7);
        assert!(k_threshold(50) < 0.7);
    }
}
