//! Core type definitions for the experiment workspace.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One (file path, label) row of a dataset manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path to the image file
    pub path: PathBuf,
    /// Integer class label (0/1 for binary tasks, 0..N otherwise)
    pub label: i64,
}

impl ManifestEntry {
    /// Creates a new manifest entry
    pub fn new(path: impl Into<PathBuf>, label: i64) -> Self {
        Self {
            path: path.into(),
            label,
        }
    }
}

/// Ordered, immutable sequence of labeled image files.
///
/// Loaded once per experiment; splits and flows borrow or clone rows out of
/// it but never mutate it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Creates a manifest from rows
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Labels in manifest order
    pub fn labels(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.label).collect()
    }

    /// Distinct labels in ascending numeric order
    pub fn distinct_labels(&self) -> Vec<i64> {
        let set: BTreeSet<i64> = self.entries.iter().map(|e| e.label).collect();
        set.into_iter().collect()
    }
}

impl FromIterator<ManifestEntry> for Manifest {
    fn from_iter<T: IntoIterator<Item = ManifestEntry>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Classification mode of an experiment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClassMode {
    /// Two classes, scalar 0/1 targets
    Binary,
    /// N classes, one-hot targets
    Categorical,
}

impl ClassMode {
    pub fn from_binary_flag(is_binary: bool) -> Self {
        if is_binary {
            ClassMode::Binary
        } else {
            ClassMode::Categorical
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, ClassMode::Binary)
    }
}

impl std::fmt::Display for ClassMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassMode::Binary => write!(f, "binary"),
            ClassMode::Categorical => write!(f, "categorical"),
        }
    }
}

/// Branch role of a sub-model in the attention-guided architecture
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Branch {
    /// Trained on full images
    Global,
    /// Trained on cropped regions of interest
    Local,
    /// Consumes both branches through the fused flow
    Fused,
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Branch::Global => write!(f, "global"),
            Branch::Local => write!(f, "local"),
            Branch::Fused => write!(f, "fused"),
        }
    }
}

/// Image dimensions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageDimensions {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Number of channels (3 for RGB)
    pub channels: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    /// Standard ImageNet dimensions (224x224x3)
    pub fn imagenet() -> Self {
        Self::new(224, 224, 3)
    }

    /// Total number of values per image
    pub fn total_pixels(&self) -> u32 {
        self.width * self.height * self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_labels() {
        let manifest = Manifest::new(vec![
            ManifestEntry::new("a.png", 1),
            ManifestEntry::new("b.png", 0),
            ManifestEntry::new("c.png", 1),
        ]);
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.labels(), vec![1, 0, 1]);
        assert_eq!(manifest.distinct_labels(), vec![0, 1]);
    }

    #[test]
    fn test_class_mode() {
        assert_eq!(ClassMode::from_binary_flag(true), ClassMode::Binary);
        assert_eq!(ClassMode::from_binary_flag(false), ClassMode::Categorical);
        assert_eq!(ClassMode::Binary.to_string(), "binary");
        assert_eq!(ClassMode::Categorical.to_string(), "categorical");
    }

    #[test]
    fn test_branch_display() {
        assert_eq!(Branch::Global.to_string(), "global");
        assert_eq!(Branch::Local.to_string(), "local");
        assert_eq!(Branch::Fused.to_string(), "fused");
    }

    #[test]
    fn test_image_dimensions() {
        let dims = ImageDimensions::imagenet();
        assert_eq!(dims.width, 224);
        assert_eq!(dims.height, 224);
        assert_eq!(dims.total_pixels(), 224 * 224 * 3);
    }
}
