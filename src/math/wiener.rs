//! Wiener first-passage-time density and a diffusion simulator.
//!
//! The drift-diffusion model starts evidence at `w * a` between absorbing
//! boundaries `0` and `a`, drifts at rate `v` with unit noise, and adds a
//! non-decision time `t` to the passage time.
//!
//! The lower-boundary density follows Navarro & Fuss (2009):
//!
//! ```text
//! f(rt | v, a, w) = 1/a² · exp(-v·a·w - v²·τ/2) · g(τ/a² | w),  τ = rt - t
//! ```
//!
//! where `g` is evaluated with either the small-time or the large-time series,
//! whichever needs fewer terms for the requested accuracy. Upper-boundary
//! responses use the mirrored process `(-v, 1 - w)`.

use std::f64::consts::PI;

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Truncation error target for the series.
const SERIES_ERR: f64 = 1e-7;

/// Euler step (seconds) for the simulator.
const SIM_DT: f64 = 1e-3;

/// Simulated passage times are capped at this many seconds.
const SIM_MAX_TIME: f64 = 20.0;

/// Parameters of a single trial on the natural scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DdmParams {
    /// Drift rate.
    pub v: f64,
    /// Boundary separation (> 0).
    pub a: f64,
    /// Relative starting point in (0, 1).
    pub w: f64,
    /// Non-decision time (>= 0).
    pub t: f64,
}

/// Log density of `rt` ending at the upper (`upper = true`) or lower boundary.
///
/// Returns `-inf` when `rt <= t` or the parameters are out of range.
pub fn log_pdf(rt: f64, upper: bool, p: &DdmParams) -> f64 {
    if !(p.a > 0.0 && p.w > 0.0 && p.w < 1.0 && p.t >= 0.0 && p.v.is_finite()) {
        return f64::NEG_INFINITY;
    }
    let tau = rt - p.t;
    if !(tau > 0.0) {
        return f64::NEG_INFINITY;
    }

    let (v, w) = if upper { (-p.v, 1.0 - p.w) } else { (p.v, p.w) };
    let a = p.a;
    let tt = tau / (a * a);

    let g = standardized_density(tt, w);
    if !(g > 0.0 && g.is_finite()) {
        return f64::NEG_INFINITY;
    }

    g.ln() - 2.0 * a.ln() - v * a * w - v * v * tau / 2.0
}

/// Density of the standardized process (`v = 0`, `a = 1`) at lower boundary.
fn standardized_density(tt: f64, w: f64) -> f64 {
    // Number of terms needed by the large-time series.
    let kl = if PI * tt * SERIES_ERR < 1.0 {
        let k = (-2.0 * (PI * tt * SERIES_ERR).ln() / (PI * PI * tt)).sqrt();
        k.max(1.0 / (PI * tt.sqrt()))
    } else {
        1.0 / (PI * tt.sqrt())
    };

    // Number of terms needed by the small-time series.
    let ks = if 2.0 * (2.0 * PI * tt).sqrt() * SERIES_ERR < 1.0 {
        let k = 2.0 + (-2.0 * tt * (2.0 * (2.0 * PI * tt).sqrt() * SERIES_ERR).ln()).sqrt();
        k.max(tt.sqrt() + 1.0)
    } else {
        2.0
    };

    if ks < kl {
        let k_terms = ks.ceil() as i64;
        let lo = -((k_terms - 1) / 2);
        let hi = k_terms / 2;
        let mut sum = 0.0;
        for k in lo..=hi {
            let x = w + 2.0 * k as f64;
            sum += x * (-(x * x) / (2.0 * tt)).exp();
        }
        sum / (2.0 * PI * tt * tt * tt).sqrt()
    } else {
        let k_terms = kl.ceil().max(1.0) as i64;
        let mut sum = 0.0;
        for k in 1..=k_terms {
            let kf = k as f64;
            sum += kf * (-(kf * kf) * PI * PI * tt / 2.0).exp() * (kf * PI * w).sin();
        }
        sum * PI
    }
}

/// Simulate one trial with an Euler–Maruyama random walk.
///
/// Returns `(rt, upper)`. Walks that have not absorbed by the time cap end at
/// whichever boundary is closer.
pub fn simulate<R: Rng + ?Sized>(p: &DdmParams, rng: &mut R) -> (f64, bool) {
    let sqrt_dt = SIM_DT.sqrt();
    let max_steps = (SIM_MAX_TIME / SIM_DT) as usize;

    let mut x = p.w * p.a;
    for step in 1..=max_steps {
        let z: f64 = StandardNormal.sample(rng);
        x += p.v * SIM_DT + sqrt_dt * z;
        if x >= p.a {
            return (p.t + step as f64 * SIM_DT, true);
        }
        if x <= 0.0 {
            return (p.t + step as f64 * SIM_DT, false);
        }
    }

    (p.t + SIM_MAX_TIME, x >= p.a / 2.0)
}
