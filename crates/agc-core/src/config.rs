//! Configuration structures for experiment runs.

use crate::types::{ClassMode, ImageDimensions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for one experiment run
///
/// Every field has a default, so TOML files only spell out what they change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Named dataset to resolve through the dataset provider
    pub dataset: String,
    /// Classification mode (binary vs. multi-class)
    pub class_mode: ClassMode,
    /// Whether training flows apply augmentation
    pub data_augmentation: bool,
    /// Whether per-sample classification outcomes are echoed and appended to the report
    pub print_classifications: bool,
    /// Random seed reused across splits and flows for reproducibility
    pub seed: u64,
    /// Training batch size (validation and test flows always use batch size 1)
    pub batch_size: usize,
    /// Epoch budget handed to the model provider
    pub epochs: usize,
    /// Number of cross-validation folds
    pub folds: usize,
    /// Held-out validation fraction for train/validation splits
    pub validation_fraction: f64,
    /// Target image resolution
    pub image_size: ImageDimensions,
    /// Augmentation parameters used when `data_augmentation` is set
    pub augmentation: AugmentationConfig,
    /// Root directory for model checkpoints
    pub weights_dir: PathBuf,
    /// Root directory for attention-cropped images
    pub crops_dir: PathBuf,
    /// Root directory for class-activation-map artifacts
    pub cams_dir: PathBuf,
    /// Append-only classification report file
    pub report_path: PathBuf,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            dataset: String::from("default"),
            class_mode: ClassMode::Binary,
            data_augmentation: true,
            print_classifications: false,
            seed: 42,
            batch_size: 32,
            epochs: 50,
            folds: 5,
            validation_fraction: 0.10,
            image_size: ImageDimensions::imagenet(),
            augmentation: AugmentationConfig::default(),
            weights_dir: PathBuf::from("weights"),
            crops_dir: PathBuf::from("crops"),
            cams_dir: PathBuf::from("cams"),
            report_path: PathBuf::from("info.txt"),
        }
    }
}

impl ExperimentConfig {
    /// Validates the knobs the drivers rely on
    pub fn validate(&self) -> Result<(), String> {
        if self.dataset.is_empty() {
            return Err("dataset name must not be empty".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch size must be greater than 0".to_string());
        }
        if self.epochs == 0 {
            return Err("epochs must be greater than 0".to_string());
        }
        if self.folds < 2 {
            return Err("cross-validation needs at least 2 folds".to_string());
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(format!(
                "validation fraction must be in (0, 1), got {}",
                self.validation_fraction
            ));
        }
        Ok(())
    }
}

/// Data augmentation parameters
///
/// Training flows mirror horizontally at random and jitter brightness within
/// a multiplicative range; nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Random horizontal mirroring
    pub horizontal_flip: bool,
    /// Multiplicative brightness jitter range
    pub brightness_range: (f32, f32),
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            horizontal_flip: true,
            brightness_range: (0.8, 1.2),
        }
    }
}
