//! Plain-text summaries for the log.
//!
//! Formatting lives here so the comparison code stays free of presentation
//! details; the CSV files are the machine-readable output.

use crate::domain::{ComparisonTable, DatasetStats, RowDiagnostics};

/// One-line description of the loaded trials.
pub fn format_dataset_stats(stats: &DatasetStats) -> String {
    format!(
        "Trials: n={} | subjects={} | conditions={} | rt=[{:.3}, {:.3}]s | upper={:.1}%",
        stats.n_trials,
        stats.n_subjects,
        stats.n_conditions,
        stats.rt_min,
        stats.rt_max,
        100.0 * stats.upper_rate
    )
}

/// Aligned text table of one ranking, best first.
pub fn format_comparison(table: &ComparisonTable) -> String {
    let criterion = table.criterion;
    let mut out = String::new();

    out.push_str(&format!(
        "{} ranking:\n{:>4}  {:<5} {:>12} {:>9}",
        criterion.as_str().to_uppercase(),
        "rank",
        "model",
        criterion.value_column(),
        criterion.penalty_column()
    ));
    let is_ic = table
        .rows
        .first()
        .is_some_and(|r| matches!(r.diagnostics, RowDiagnostics::Ic { .. }));
    if is_ic {
        out.push_str(&format!(" {:>9} {:>7} {:>8}", "elpd_diff", "weight", "se"));
    } else {
        out.push_str(&format!(" {:>12}", "d_bar"));
    }
    out.push('\n');

    for row in &table.rows {
        out.push_str(&format!(
            "{:>4}  {:<5} {:>12.3}",
            row.rank,
            row.model.as_str(),
            row.value
        ));
        match row.diagnostics {
            RowDiagnostics::Dic { p_d, d_bar } => {
                out.push_str(&format!(" {p_d:>9.3} {d_bar:>12.3}"));
            }
            RowDiagnostics::Ic {
                p,
                elpd_diff,
                weight,
                se,
                warning,
                ..
            } => {
                out.push_str(&format!(" {p:>9.3} {elpd_diff:>9.3} {weight:>7.3} {se:>8.3}"));
                if warning {
                    out.push_str("  (!)");
                }
            }
        }
        out.push('\n');
    }

    out
}
