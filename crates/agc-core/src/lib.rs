//! Core types and utilities for attention-guided classification experiments.
//!
//! This crate provides the error type, configuration structures, manifest
//! types and metric math shared across the experiment workspace.

pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

pub use config::{AugmentationConfig, ExperimentConfig};
pub use error::{Error, Result};
pub use metrics::{FoldMetrics, MetricsAccumulator, RankedAveragePrecision};
pub use types::{Branch, ClassMode, ImageDimensions, Manifest, ManifestEntry};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{Error, Result};
    pub use crate::metrics::*;
    pub use crate::types::*;
}
