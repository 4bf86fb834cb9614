//! Convergence diagnostics over parallel chains.

use crate::math::stats;

/// Split-R̂ (Gelman et al.): every chain is halved and the halves are treated
/// as separate chains.
///
/// Returns `NaN` when fewer than two draws per half are available or the
/// within-chain variance is zero.
pub fn split_rhat(chains: &[Vec<f64>]) -> f64 {
    let Some(min_len) = chains.iter().map(Vec::len).min() else {
        return f64::NAN;
    };
    let half = min_len / 2;
    if half < 2 {
        return f64::NAN;
    }

    let mut halves: Vec<&[f64]> = Vec::with_capacity(chains.len() * 2);
    for chain in chains {
        halves.push(&chain[..half]);
        halves.push(&chain[chain.len() - half..]);
    }

    let n = half as f64;
    let means: Vec<f64> = halves.iter().map(|h| stats::mean(h)).collect();
    let within = stats::mean(&halves.iter().map(|h| stats::variance(h, 1)).collect::<Vec<_>>());
    if !(within > 0.0) {
        return f64::NAN;
    }
    let between = n * stats::variance(&means, 1);

    let var_plus = (n - 1.0) / n * within + between / n;
    (var_plus / within).sqrt()
}
