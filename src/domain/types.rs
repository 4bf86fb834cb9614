//! Shared domain types.
//!
//! These are the records that cross component boundaries:
//!
//! - run configuration (`RunConfig`, `RecoveryConfig`)
//! - behavioral observations (`Trial`, `Dataset`)
//! - candidate identifiers (`ModelKey`, `DdmSpec`)
//! - comparison outputs (`ComparisonTable`, `ComparisonRow`)

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;

use crate::error::AppError;

/// Sampler and bookkeeping settings for one invocation.
///
/// `samples` counts every sampler iteration per chain, burn-in included, so a
/// chain keeps `samples - burn` iterations (before thinning).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub runtime_id: String,
    /// Parsed and logged; does not influence computation.
    pub iterations: u32,
    pub samples: usize,
    pub burn: usize,
    pub chains: usize,
    pub thin: usize,
    pub seed: u64,
    /// Number of posterior draws turned into simulated datasets.
    pub ppc_draws: usize,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.runtime_id.is_empty() {
            return Err(AppError::data("Runtime id must not be empty."));
        }
        if self
            .runtime_id
            .chars()
            .any(|c| std::path::is_separator(c) || c == '\0')
        {
            return Err(AppError::data(format!(
                "Runtime id '{}' must not contain path separators.",
                self.runtime_id
            )));
        }
        if self.iterations == 0 {
            return Err(AppError::data("Iteration must be >= 1."));
        }
        if self.samples == 0 {
            return Err(AppError::data("Samples must be >= 1."));
        }
        if self.burn >= self.samples {
            return Err(AppError::data(format!(
                "Burn ({}) must be smaller than samples ({}).",
                self.burn, self.samples
            )));
        }
        if self.chains == 0 {
            return Err(AppError::data("Chains must be >= 1."));
        }
        if self.thin == 0 {
            return Err(AppError::data("Thin must be >= 1."));
        }
        Ok(())
    }

    /// Number of draws each chain retains after burn-in and thinning.
    pub fn kept_per_chain(&self) -> usize {
        (self.samples - self.burn).div_ceil(self.thin)
    }
}

/// Where the behavioral data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Csv {
        path: PathBuf,
        condition_column: String,
    },
    /// Simulate from a known candidate, the "generate" half of model recovery.
    Simulate {
        model: ModelKey,
        subjects: usize,
        trials_per_subject: usize,
        seed: u64,
    },
}

/// Everything the pipeline needs, derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    pub run: RunConfig,
    pub source: DataSource,
    pub out_dir: PathBuf,
    pub weight_method: WeightMethod,
}

/// One behavioral trial.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub subject: u32,
    /// Response time in seconds.
    pub rt: f64,
    /// 1 = upper boundary, 0 = lower boundary.
    pub response: u8,
    pub condition: String,
}

/// Summary stats about the loaded trials.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_trials: usize,
    pub n_subjects: usize,
    pub n_conditions: usize,
    pub rt_min: f64,
    pub rt_max: f64,
    pub upper_rate: f64,
}

/// Ordered, read-only trial table.
#[derive(Debug, Clone)]
pub struct Dataset {
    trials: Vec<Trial>,
    subjects: Vec<u32>,
    conditions: Vec<String>,
}

impl Dataset {
    pub fn new(trials: Vec<Trial>) -> Result<Self, AppError> {
        if trials.is_empty() {
            return Err(AppError::data("Dataset contains no trials."));
        }
        for (i, t) in trials.iter().enumerate() {
            if !(t.rt.is_finite() && t.rt > 0.0) {
                return Err(AppError::data(format!(
                    "Trial {i}: response time must be positive, got {}.",
                    t.rt
                )));
            }
            if t.response > 1 {
                return Err(AppError::data(format!(
                    "Trial {i}: response must be 0 or 1, got {}.",
                    t.response
                )));
            }
        }

        let subjects: Vec<u32> = trials
            .iter()
            .map(|t| t.subject)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let conditions: Vec<String> = trials
            .iter()
            .map(|t| t.condition.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(Self {
            trials,
            subjects,
            conditions,
        })
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Sorted unique subject ids.
    pub fn subjects(&self) -> &[u32] {
        &self.subjects
    }

    /// Sorted unique condition labels.
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn subject_index(&self, subject: u32) -> Option<usize> {
        self.subjects.binary_search(&subject).ok()
    }

    pub fn condition_index(&self, condition: &str) -> Option<usize> {
        self.conditions
            .binary_search_by(|c| c.as_str().cmp(condition))
            .ok()
    }

    pub fn stats(&self) -> DatasetStats {
        let mut rt_min = f64::INFINITY;
        let mut rt_max = f64::NEG_INFINITY;
        let mut upper = 0usize;
        for t in &self.trials {
            rt_min = rt_min.min(t.rt);
            rt_max = rt_max.max(t.rt);
            upper += usize::from(t.response);
        }
        DatasetStats {
            n_trials: self.trials.len(),
            n_subjects: self.subjects.len(),
            n_conditions: self.conditions.len(),
            rt_min,
            rt_max,
            upper_rate: upper as f64 / self.trials.len() as f64,
        }
    }
}

/// Identifier of one candidate model.
///
/// The set is fixed; registry order follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum ModelKey {
    Ms0,
    Ms1,
    Ms2,
    Ms3,
    Ms4,
    Ms5,
    Ms6,
    Ms7,
}

impl ModelKey {
    pub const ALL: [ModelKey; 8] = [
        ModelKey::Ms0,
        ModelKey::Ms1,
        ModelKey::Ms2,
        ModelKey::Ms3,
        ModelKey::Ms4,
        ModelKey::Ms5,
        ModelKey::Ms6,
        ModelKey::Ms7,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKey::Ms0 => "ms0",
            ModelKey::Ms1 => "ms1",
            ModelKey::Ms2 => "ms2",
            ModelKey::Ms3 => "ms3",
            ModelKey::Ms4 => "ms4",
            ModelKey::Ms5 => "ms5",
            ModelKey::Ms6 => "ms6",
            ModelKey::Ms7 => "ms7",
        }
    }

    /// Which DDM parameters this candidate lets vary by condition.
    ///
    /// The eight candidates form the full factorial over `v`, `a`, `t`.
    pub fn spec(self) -> DdmSpec {
        let (v, a, t) = match self {
            ModelKey::Ms0 => (false, false, false),
            ModelKey::Ms1 => (true, false, false),
            ModelKey::Ms2 => (false, true, false),
            ModelKey::Ms3 => (false, false, true),
            ModelKey::Ms4 => (true, true, false),
            ModelKey::Ms5 => (true, false, true),
            ModelKey::Ms6 => (false, true, true),
            ModelKey::Ms7 => (true, true, true),
        };
        DdmSpec {
            v_by_condition: v,
            a_by_condition: a,
            t_by_condition: t,
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structure of one hierarchical DDM candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DdmSpec {
    pub v_by_condition: bool,
    pub a_by_condition: bool,
    pub t_by_condition: bool,
}

impl DdmSpec {
    /// Short label such as `v,a ~ cond` for logs.
    pub fn describe(self) -> String {
        let mut varying = Vec::new();
        if self.v_by_condition {
            varying.push("v");
        }
        if self.a_by_condition {
            varying.push("a");
        }
        if self.t_by_condition {
            varying.push("t");
        }
        if varying.is_empty() {
            "v,a,t shared".to_string()
        } else {
            format!("{} ~ cond", varying.join(","))
        }
    }
}

/// Information criterion used to rank candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Dic,
    Loo,
    Waic,
}

impl Criterion {
    pub fn as_str(self) -> &'static str {
        match self {
            Criterion::Dic => "dic",
            Criterion::Loo => "loo",
            Criterion::Waic => "waic",
        }
    }

    /// Name of the criterion-value column in reports.
    pub fn value_column(self) -> &'static str {
        match self {
            Criterion::Dic => "dic",
            Criterion::Loo => "elpd_loo",
            Criterion::Waic => "elpd_waic",
        }
    }

    /// Name of the effective-parameter column in reports.
    pub fn penalty_column(self) -> &'static str {
        match self {
            Criterion::Dic => "p_d",
            Criterion::Loo => "p_loo",
            Criterion::Waic => "p_waic",
        }
    }
}

/// How LOO/WAIC tables assign model weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WeightMethod {
    /// Maximize the leave-one-out log score of the weighted mixture.
    Stacking,
    /// Weights proportional to `exp(elpd)`.
    PseudoBma,
}

/// Per-row diagnostics; the column set depends on the criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum RowDiagnostics {
    Dic {
        p_d: f64,
        d_bar: f64,
    },
    Ic {
        p: f64,
        elpd_diff: f64,
        weight: f64,
        se: f64,
        dse: f64,
        warning: bool,
    },
}

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub model: ModelKey,
    /// 0-based position in the sorted table.
    pub rank: usize,
    pub value: f64,
    pub diagnostics: RowDiagnostics,
}

/// A ranking of candidates by one criterion, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    pub criterion: Criterion,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn best(&self) -> Option<&ComparisonRow> {
        self.rows.first()
    }

    pub fn row(&self, model: ModelKey) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.model == model)
    }
}

/// The three rankings produced by one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSet {
    pub dic: ComparisonTable,
    pub loo: ComparisonTable,
    pub waic: ComparisonTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(subject: u32, rt: f64, response: u8, condition: &str) -> Trial {
        Trial {
            subject,
            rt,
            response,
            condition: condition.to_string(),
        }
    }

    fn run_config() -> RunConfig {
        RunConfig {
            runtime_id: "0".to_string(),
            iterations: 1,
            samples: 2000,
            burn: 1000,
            chains: 4,
            thin: 1,
            seed: 42,
            ppc_draws: 20,
        }
    }

    #[test]
    fn run_config_rejects_burn_not_below_samples() {
        let mut cfg = run_config();
        cfg.burn = cfg.samples;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }

    #[test]
    fn run_config_rejects_separator_in_runtime() {
        let mut cfg = run_config();
        cfg.runtime_id = "a/b".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn kept_per_chain_accounts_for_thinning() {
        let mut cfg = run_config();
        assert_eq!(cfg.kept_per_chain(), 1000);
        cfg.thin = 3;
        assert_eq!(cfg.kept_per_chain(), 334);
    }

    #[test]
    fn dataset_indexes_subjects_and_conditions_sorted() {
        let ds = Dataset::new(vec![
            trial(7, 0.6, 1, "LC"),
            trial(2, 0.8, 0, "HC"),
            trial(7, 0.9, 1, "HC"),
        ])
        .unwrap();
        assert_eq!(ds.subjects(), &[2, 7]);
        assert_eq!(ds.conditions(), &["HC".to_string(), "LC".to_string()]);
        assert_eq!(ds.subject_index(7), Some(1));
        assert_eq!(ds.condition_index("LC"), Some(1));

        let stats = ds.stats();
        assert_eq!(stats.n_trials, 3);
        assert!((stats.upper_rate - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn dataset_rejects_non_positive_rt() {
        let err = Dataset::new(vec![trial(1, 0.0, 1, "HC")]).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
    }

    #[test]
    fn model_keys_cover_the_factorial_once() {
        let specs: std::collections::HashSet<DdmSpec> =
            ModelKey::ALL.iter().map(|k| k.spec()).collect();
        assert_eq!(specs.len(), 8);
        assert_eq!(ModelKey::Ms0.spec().describe(), "v,a,t shared");
        assert_eq!(ModelKey::Ms5.spec().describe(), "v,t ~ cond");
    }
}
