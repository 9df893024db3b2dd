//! Deterministic checkpoint paths.
//!
//! Every trained model resolves its weights file from the dataset name, an
//! optional variant suffix and (for cross-validation) the fold position, so
//! reruns find and reuse exactly the weights an earlier run produced.

use agc_core::{ExperimentConfig, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Maps experiment runs onto a fixed on-disk weights layout.
///
/// A run over dataset `leaves` with variant `global` keeps its weights under
/// `<root>/leaves_global/`; fold 2 of a 5-fold run is
/// `weights_fold_2_from_5.hdf5`, a plain split run just `weights.hdf5`.
#[derive(Debug, Clone)]
pub struct WeightsLayout {
    root: PathBuf,
}

impl WeightsLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &ExperimentConfig) -> Self {
        Self::new(&config.weights_dir)
    }

    fn model_dir(&self, dataset: &str, variant: Option<&str>) -> PathBuf {
        let name = match variant {
            Some(variant) => format!("{dataset}_{variant}"),
            None => dataset.to_string(),
        };
        self.root.join(name)
    }

    /// Weights path for a single train/test split run
    pub fn run_weights(&self, dataset: &str, variant: Option<&str>) -> PathBuf {
        self.model_dir(dataset, variant).join("weights.hdf5")
    }

    /// Weights path for one fold of a cross-validation run
    pub fn fold_weights(
        &self,
        dataset: &str,
        variant: Option<&str>,
        fold: usize,
        folds: usize,
    ) -> PathBuf {
        self.model_dir(dataset, variant)
            .join(format!("weights_fold_{fold}_from_{folds}.hdf5"))
    }
}

/// Creates the parent directory of a weights path
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
