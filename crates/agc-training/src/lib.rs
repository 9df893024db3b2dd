//! Experiment drivers for attention-guided classification.
//!
//! Ties the dataset flows to a pluggable model provider: deterministic
//! checkpoint paths, prediction mapping back into the label space,
//! per-sample reporting, and the three run protocols (train/test split,
//! cross-validation, attention-guided cross-validation).

pub mod checkpoint;
pub mod driver;
pub mod model;
pub mod prediction;
pub mod report;

pub use checkpoint::{ensure_parent_dir, WeightsLayout};
pub use driver::{run_attention_guided_cv, run_cross_validation, run_split, ExperimentOutcome};
pub use model::{CamProvider, ModelProvider, PredictiveModel, TrainContext};
pub use prediction::{align_binary_scores, calculate_prediction, Prediction, BINARY_THRESHOLD};
pub use report::ReportWriter;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::checkpoint::{ensure_parent_dir, WeightsLayout};
    pub use crate::driver::{
        run_attention_guided_cv, run_cross_validation, run_split, ExperimentOutcome,
    };
    pub use crate::model::{CamProvider, ModelProvider, PredictiveModel, TrainContext};
    pub use crate::prediction::{calculate_prediction, Prediction};
    pub use crate::report::ReportWriter;
}
