//! Dataset manifests and the provider seam.

use agc_core::{Error, Manifest, ManifestEntry, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Resolves named datasets into labeled manifests.
///
/// The experiment drivers only ever see this trait; where the rows come from
/// (directory trees, index files, a remote catalog) is the provider's
/// business.
pub trait DatasetProvider {
    /// Manifest of the training partition of a named dataset
    fn train_dataset_info(&self, name: &str) -> Result<Manifest>;

    /// Manifest of the held-out test partition of a named dataset
    fn test_dataset_info(&self, name: &str) -> Result<Manifest>;
}

/// Filesystem-backed dataset provider.
///
/// Expects `<root>/<name>/{train,test}/<label>/<image>` where each `<label>`
/// directory name is the integer class label.
pub struct FsDatasetProvider {
    root: PathBuf,
}

impl FsDatasetProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn scan_partition(&self, name: &str, partition: &str) -> Result<Manifest> {
        let dir = self.root.join(name).join(partition);
        if !dir.is_dir() {
            return Err(Error::NotFound(format!(
                "Dataset partition not found: {}",
                dir.display()
            )));
        }

        let mut class_dirs: Vec<(i64, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let label = path
                .file_name()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or_else(|| {
                    Error::Dataset(format!(
                        "class directory name is not an integer label: {}",
                        path.display()
                    ))
                })?;
            class_dirs.push((label, path));
        }
        class_dirs.sort_by_key(|(label, _)| *label);

        let mut entries = Vec::new();
        for (label, class_dir) in class_dirs {
            let mut files: Vec<PathBuf> = std::fs::read_dir(&class_dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_image_file(p))
                .collect();
            files.sort();

            for path in files {
                entries.push(ManifestEntry::new(path, label));
            }
        }

        if entries.is_empty() {
            return Err(Error::Dataset(format!(
                "no labeled images under {}",
                dir.display()
            )));
        }

        info!(
            dataset = name,
            partition,
            rows = entries.len(),
            "loaded dataset manifest"
        );
        Ok(Manifest::new(entries))
    }
}

impl DatasetProvider for FsDatasetProvider {
    fn train_dataset_info(&self, name: &str) -> Result<Manifest> {
        self.scan_partition(name, "train")
    }

    fn test_dataset_info(&self, name: &str) -> Result<Manifest> {
        self.scan_partition(name, "test")
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            matches!(
                ext.to_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "bmp" | "gif"
            )
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::fs;
    use tempfile::TempDir;

    fn create_test_image(path: &Path) {
        let img = ImageBuffer::from_fn(4, 4, |_, _| Rgb([255u8, 0u8, 0u8]));
        img.save(path).unwrap();
    }

    fn seed_dataset(root: &Path, name: &str) {
        for partition in ["train", "test"] {
            for label in 0..2 {
                let dir = root.join(name).join(partition).join(label.to_string());
                fs::create_dir_all(&dir).unwrap();
                for i in 0..3 {
                    create_test_image(&dir.join(format!("img_{i}.png")));
                }
                fs::write(dir.join("notes.txt"), "not an image").unwrap();
            }
        }
    }

    #[test]
    fn test_scans_labeled_partitions() {
        let temp_dir = TempDir::new().unwrap();
        seed_dataset(temp_dir.path(), "toy");

        let provider = FsDatasetProvider::new(temp_dir.path());
        let train = provider.train_dataset_info("toy").unwrap();
        let test = provider.test_dataset_info("toy").unwrap();

        assert_eq!(train.len(), 6);
        assert_eq!(test.len(), 6);
        assert_eq!(train.distinct_labels(), vec![0, 1]);
    }

    #[test]
    fn test_manifest_order_is_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        seed_dataset(temp_dir.path(), "toy");

        let provider = FsDatasetProvider::new(temp_dir.path());
        let a = provider.train_dataset_info("toy").unwrap();
        let b = provider.train_dataset_info("toy").unwrap();
        assert_eq!(a.entries(), b.entries());

        // Label 0 rows come first.
        assert!(a.entries()[0].label <= a.entries()[a.len() - 1].label);
    }

    #[test]
    fn test_missing_dataset_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let provider = FsDatasetProvider::new(temp_dir.path());
        assert!(matches!(
            provider.train_dataset_info("absent"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_non_numeric_class_directory_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("bad/train/healthy");
        fs::create_dir_all(&dir).unwrap();
        create_test_image(&dir.join("img.png"));

        let provider = FsDatasetProvider::new(temp_dir.path());
        assert!(matches!(
            provider.train_dataset_info("bad"),
            Err(Error::Dataset(_))
        ));
    }
}
