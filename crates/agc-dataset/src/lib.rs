//! Dataset handling for attention-guided classification experiments.
//!
//! This crate turns named datasets into labeled manifests, splits them with
//! stratified strategies, and serves them to trainers as reproducible batch
//! flows, including the fused dual-input flow the attention-guided driver
//! consumes.

pub mod augmentation;
pub mod flow;
pub mod loader;
pub mod manifest;
pub mod split;

pub use augmentation::Augmenter;
pub use flow::{create_flow, training_validation_flows, Batch, Flow, FlowOptions, FusedBatch, FusedFlow};
pub use loader::ImageLoader;
pub use manifest::{DatasetProvider, FsDatasetProvider};
pub use split::{stratified_holdout, StratifiedKFold};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::augmentation::Augmenter;
    pub use crate::flow::{
        create_flow, training_validation_flows, Batch, Flow, FlowOptions, FusedBatch, FusedFlow,
    };
    pub use crate::loader::ImageLoader;
    pub use crate::manifest::{DatasetProvider, FsDatasetProvider};
    pub use crate::split::{stratified_holdout, StratifiedKFold};
}
