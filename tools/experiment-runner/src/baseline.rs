//! Class-prior baseline provider.
//!
//! Stands in for a real network behind the [`ModelProvider`] seam: it
//! "trains" by measuring class frequencies on the training flow and predicts
//! those frequencies for every sample. Checkpoints are JSON files at the
//! driver's deterministic weights paths, so reruns reload instead of
//! refitting, exactly like a weights-backed provider would.

use agc_core::{Error, Result};
use agc_dataset::{Flow, FusedFlow};
use agc_training::{ensure_parent_dir, ModelProvider, PredictiveModel, TrainContext};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Predicts the training class distribution for every sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorModel {
    /// Class frequency per encoded class index
    pub(crate) priors: Vec<f32>,
    /// RFC 3339 timestamp of the fit
    pub(crate) trained_at: String,
}

impl PriorModel {
    fn fit(flow: &Flow) -> Result<Self> {
        let classes = flow.classes();
        if classes.is_empty() {
            return Err(Error::InsufficientData(
                "cannot fit priors on an empty flow".to_string(),
            ));
        }

        let mut counts = vec![0usize; flow.class_indices().len()];
        for &class in &classes {
            counts[class as usize] += 1;
        }

        let total = classes.len() as f32;
        Ok(Self {
            priors: counts.iter().map(|&c| c as f32 / total).collect(),
            trained_at: Utc::now().to_rfc3339(),
        })
    }

    fn save(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// One output row: the sigmoid-style probability of encoded index 1 for
    /// binary heads, the whole distribution otherwise.
    fn output_row(&self, binary: bool) -> Vec<f32> {
        if binary {
            vec![self.priors.get(1).copied().unwrap_or(0.0)]
        } else {
            self.priors.clone()
        }
    }
}

impl PredictiveModel for PriorModel {
    fn predict(&self, flow: &mut Flow) -> Result<Vec<Vec<f32>>> {
        let row = self.output_row(flow.mode().is_binary());
        Ok(vec![row; flow.len()])
    }

    fn predict_fused(&self, flow: &mut FusedFlow<'_>, steps: usize) -> Result<Vec<Vec<f32>>> {
        let mut rows = Vec::new();
        for _ in 0..steps {
            let batch = flow.next_batch()?;
            let row = self.output_row(batch.first.label_width == 1);
            rows.extend(std::iter::repeat(row).take(batch.first.len));
        }
        Ok(rows)
    }
}

/// Trains [`PriorModel`]s, reloading from the checkpoint when one exists.
pub struct PriorProvider;

impl ModelProvider for PriorProvider {
    type Model = PriorModel;

    fn train_or_load(
        &self,
        context: &TrainContext<'_>,
        train: &mut Flow,
        _validation: &mut Flow,
    ) -> Result<PriorModel> {
        if context.weights_path.exists() {
            let model = PriorModel::load(&context.weights_path)?;
            info!(
                branch = %context.branch,
                path = %context.weights_path.display(),
                "loaded prior model from checkpoint"
            );
            return Ok(model);
        }

        let model = PriorModel::fit(train)?;
        model.save(&context.weights_path)?;
        info!(
            branch = %context.branch,
            samples = train.len(),
            path = %context.weights_path.display(),
            "fitted prior model"
        );
        Ok(model)
    }

    fn train_or_load_fused(
        &self,
        context: &TrainContext<'_>,
        branches: (&PriorModel, &PriorModel),
        _train: &mut FusedFlow<'_>,
        _train_steps: usize,
        _validation: &mut FusedFlow<'_>,
        _validation_steps: usize,
    ) -> Result<PriorModel> {
        if context.weights_path.exists() {
            let model = PriorModel::load(&context.weights_path)?;
            info!(
                path = %context.weights_path.display(),
                "loaded fused prior model from checkpoint"
            );
            return Ok(model);
        }

        let (global, local) = branches;
        if global.priors.len() != local.priors.len() {
            return Err(Error::Model(format!(
                "branch priors disagree on class count: {} vs {}",
                global.priors.len(),
                local.priors.len()
            )));
        }

        let model = PriorModel {
            priors: global
                .priors
                .iter()
                .zip(&local.priors)
                .map(|(a, b)| (a + b) / 2.0)
                .collect(),
            trained_at: Utc::now().to_rfc3339(),
        };
        model.save(&context.weights_path)?;
        info!(path = %context.weights_path.display(), "fitted fused prior model");
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agc_core::{Branch, ExperimentConfig, ImageDimensions, Manifest, ManifestEntry};
    use agc_dataset::create_flow;
    use tempfile::TempDir;

    fn flow_over(labels: &[i64]) -> Flow {
        let manifest: Manifest = labels
            .iter()
            .enumerate()
            .map(|(i, &label)| ManifestEntry::new(format!("img_{i}.png"), label))
            .collect();
        let config = ExperimentConfig {
            image_size: ImageDimensions::new(4, 4, 3),
            ..ExperimentConfig::default()
        };
        create_flow(&manifest, &config, 1, false, false).unwrap()
    }

    #[test]
    fn test_fit_measures_class_frequencies() {
        let flow = flow_over(&[1, 1, 1, 0]);
        let model = PriorModel::fit(&flow).unwrap();
        assert_eq!(model.priors, vec![0.25, 0.75]);
    }

    #[test]
    fn test_predict_is_constant_per_flow() {
        let mut flow = flow_over(&[1, 1, 0, 0]);
        let model = PriorModel::fit(&flow).unwrap();

        let outputs = model.predict(&mut flow).unwrap();
        assert_eq!(outputs.len(), 4);
        assert!(outputs.iter().all(|row| row == &vec![0.5]));
    }

    #[test]
    fn test_provider_reloads_existing_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let config = ExperimentConfig::default();
        let context = TrainContext {
            config: &config,
            branch: Branch::Global,
            weights_path: temp_dir.path().join("m/weights.hdf5"),
        };

        let mut train = flow_over(&[1, 1, 1, 0]);
        let mut validation = flow_over(&[1, 0]);

        let first = PriorProvider
            .train_or_load(&context, &mut train, &mut validation)
            .unwrap();
        assert!(context.weights_path.exists());

        // A second run must load the same fit, not retrain.
        let second = PriorProvider
            .train_or_load(&context, &mut train, &mut validation)
            .unwrap();
        assert_eq!(second.trained_at, first.trained_at);
        assert_eq!(second.priors, first.priors);
    }

    #[test]
    fn test_fused_model_averages_branch_priors() {
        let temp_dir = TempDir::new().unwrap();
        let config = ExperimentConfig::default();
        let context = TrainContext {
            config: &config,
            branch: Branch::Fused,
            weights_path: temp_dir.path().join("fused/weights.hdf5"),
        };

        let global = PriorModel {
            priors: vec![0.2, 0.8],
            trained_at: String::new(),
        };
        let local = PriorModel {
            priors: vec![0.4, 0.6],
            trained_at: String::new(),
        };

        let mut a = flow_over(&[0, 1]);
        let mut b = flow_over(&[0, 1]);
        let mut c = flow_over(&[0, 1]);
        let mut d = flow_over(&[0, 1]);
        let mut train = FusedFlow::new(&mut a, &mut b);
        let mut validation = FusedFlow::new(&mut c, &mut d);

        let fused = PriorProvider
            .train_or_load_fused(&context, (&global, &local), &mut train, 2, &mut validation, 2)
            .unwrap();
        assert!((fused.priors[0] - 0.3).abs() < 1e-6);
        assert!((fused.priors[1] - 0.7).abs() < 1e-6);
    }
}
