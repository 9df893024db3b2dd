//! Seams to the model library.
//!
//! The drivers never construct networks themselves; they hand flows to a
//! [`ModelProvider`] and get back something that can predict. Anything that
//! trains (or reloads) a classifier behind these traits plugs into every
//! driver unchanged.

use agc_core::{Branch, ExperimentConfig, Manifest, Result};
use agc_dataset::{Flow, FusedFlow};
use std::path::{Path, PathBuf};

/// Everything a provider needs to train or reload one model.
#[derive(Debug)]
pub struct TrainContext<'a> {
    pub config: &'a ExperimentConfig,
    /// Role of the model in the run
    pub branch: Branch,
    /// Deterministic weights path; providers load from it when it exists and
    /// save to it after training
    pub weights_path: PathBuf,
}

/// A trained classifier.
pub trait PredictiveModel {
    /// Class probabilities for every sample of one full pass over the flow.
    ///
    /// Rows follow the flow's iteration order; each row has one column per
    /// output unit (one sigmoid column for binary models, a softmax row
    /// otherwise).
    fn predict(&self, flow: &mut Flow) -> Result<Vec<Vec<f32>>>;

    /// Class probabilities over `steps` pulls from a fused dual-input flow.
    ///
    /// The fused flow never ends on its own, so the caller fixes the pass
    /// length, typically the step count of the first source flow.
    fn predict_fused(&self, flow: &mut FusedFlow<'_>, steps: usize) -> Result<Vec<Vec<f32>>>;
}

/// Trains models, or reloads them from their checkpoint when one exists.
pub trait ModelProvider {
    type Model: PredictiveModel;

    /// Single-input model over a training flow with a held-out validation
    /// flow.
    fn train_or_load(
        &self,
        context: &TrainContext<'_>,
        train: &mut Flow,
        validation: &mut Flow,
    ) -> Result<Self::Model>;

    /// Fusion model consuming both branches through fused flows.
    ///
    /// `branches` are the already-trained global and local models the fusion
    /// head is built from.
    fn train_or_load_fused(
        &self,
        context: &TrainContext<'_>,
        branches: (&Self::Model, &Self::Model),
        train: &mut FusedFlow<'_>,
        train_steps: usize,
        validation: &mut FusedFlow<'_>,
        validation_steps: usize,
    ) -> Result<Self::Model>;
}

/// Derives regions of interest from a trained model's class activation maps.
pub trait CamProvider<M: PredictiveModel> {
    /// Writes class-activation-map artifacts for the manifest's images under
    /// `output_dir`.
    fn draw_class_activation_map(
        &self,
        model: &M,
        manifest: &Manifest,
        output_dir: &Path,
    ) -> Result<()>;

    /// Crops every image in the manifest around its strongest activation
    /// region, writes the crops under `output_dir`, and returns a manifest of
    /// the cropped files.
    ///
    /// The returned manifest must keep the input's row order and labels, so
    /// flows built over it stay synchronized with flows over the original.
    fn crop_to_attention(
        &self,
        model: &M,
        manifest: &Manifest,
        output_dir: &Path,
    ) -> Result<Manifest>;
}
