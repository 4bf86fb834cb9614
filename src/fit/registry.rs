//! Model runner registry.
//!
//! The registry is a single ordered list of `(ModelKey, runner)` pairs, so a
//! key can never drift out of sync with the routine that fits it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rayon::prelude::*;

use crate::domain::{Dataset, DdmSpec, ModelKey, RunConfig};
use crate::error::AppError;
use crate::fit::fitted::FittedModel;
use crate::fit::sampler::run_chain;
use crate::models::CompiledModel;

/// A model-fitting routine.
///
/// Implementations must not mutate shared state: the orchestrator calls every
/// runner concurrently against the same dataset.
pub trait ModelRunner: Send + Sync {
    fn fit(&self, dataset: &Dataset, config: &RunConfig) -> Result<FittedModel, AppError>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Fits one hierarchical DDM candidate with `config.chains` parallel chains.
#[derive(Debug, Clone, Copy)]
pub struct DdmRunner {
    spec: DdmSpec,
}

impl DdmRunner {
    pub fn new(spec: DdmSpec) -> Self {
        Self { spec }
    }
}

impl ModelRunner for DdmRunner {
    fn fit(&self, dataset: &Dataset, config: &RunConfig) -> Result<FittedModel, AppError> {
        let model = Arc::new(CompiledModel::new(self.spec, dataset)?);

        let chains = (0..config.chains)
            .into_par_iter()
            .map(|chain| run_chain(&model, config, chain, derive_seed(config.seed, chain)))
            .collect::<Result<Vec<_>, _>>()?;

        FittedModel::new(model, chains)
    }

    fn describe(&self) -> String {
        self.spec.describe()
    }
}

pub struct RegistryEntry {
    pub key: ModelKey,
    pub runner: Box<dyn ModelRunner>,
}

/// Ordered candidates; keys are unique.
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn new(entries: Vec<(ModelKey, Box<dyn ModelRunner>)>) -> Result<Self, AppError> {
        if entries.is_empty() {
            return Err(AppError::data("Model registry is empty."));
        }
        let mut seen = Vec::with_capacity(entries.len());
        for (key, _) in &entries {
            if seen.contains(key) {
                return Err(AppError::data(format!("Model key {key} registered twice.")));
            }
            seen.push(*key);
        }
        Ok(Self {
            entries: entries
                .into_iter()
                .map(|(key, runner)| RegistryEntry { key, runner })
                .collect(),
        })
    }

    /// The eight DDM candidates `ms0`..`ms7`.
    pub fn ddm_candidates() -> Self {
        Self {
            entries: ModelKey::ALL
                .iter()
                .map(|&key| RegistryEntry {
                    key,
                    runner: Box::new(DdmRunner::new(key.spec())),
                })
                .collect(),
        }
    }

    /// Swap the runner registered under `key` (keeps its position).
    pub fn replace(&mut self, key: ModelKey, runner: Box<dyn ModelRunner>) -> Result<(), AppError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.key == key)
            .ok_or_else(|| AppError::data(format!("Model key {key} is not registered.")))?;
        entry.runner = runner;
        Ok(())
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn keys(&self) -> Vec<ModelKey> {
        self.entries.iter().map(|e| e.key).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::ddm_candidates()
    }
}

/// Mix a base seed with a stream label so parallel work stays reproducible
/// regardless of scheduling order.
pub fn derive_seed<T: Hash>(seed: u64, label: T) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    label.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl ModelRunner for Failing {
        fn fit(&self, _: &Dataset, _: &RunConfig) -> Result<FittedModel, AppError> {
            Err(AppError::fit("boom"))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    #[test]
    fn default_registry_lists_eight_keys_in_order() {
        let registry = Registry::default();
        assert_eq!(registry.keys(), ModelKey::ALL.to_vec());
        assert_eq!(registry.entries()[3].runner.describe(), "t ~ cond");
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let entries: Vec<(ModelKey, Box<dyn ModelRunner>)> = vec![
            (ModelKey::Ms0, Box::new(Failing)),
            (ModelKey::Ms0, Box::new(Failing)),
        ];
        assert!(Registry::new(entries).is_err());
    }

    #[test]
    fn replace_keeps_position() {
        let mut registry = Registry::default();
        registry.replace(ModelKey::Ms3, Box::new(Failing)).unwrap();
        assert_eq!(registry.keys()[3], ModelKey::Ms3);
        assert_eq!(registry.entries()[3].runner.describe(), "failing");
    }

    #[test]
    fn derived_seeds_differ_by_label() {
        assert_eq!(derive_seed(42, "ms1"), derive_seed(42, "ms1"));
        assert_ne!(derive_seed(42, "ms1"), derive_seed(42, "ms2"));
        assert_ne!(derive_seed(42, 0usize), derive_seed(42, 1usize));
    }
}
