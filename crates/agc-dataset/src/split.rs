//! Stratified split strategies.
//!
//! Both splitters preserve per-class proportions and are deterministic for a
//! given seed, so derived flows built with the same seed stay reproducible
//! across runs.

use agc_core::{Error, Manifest, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

fn indices_by_class(manifest: &Manifest) -> BTreeMap<i64, Vec<usize>> {
    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, entry) in manifest.entries().iter().enumerate() {
        by_class.entry(entry.label).or_default().push(idx);
    }
    by_class
}

fn take_rows(manifest: &Manifest, mut indices: Vec<usize>) -> Manifest {
    // Keep manifest order inside each partition for stable flow listings.
    indices.sort_unstable();
    indices
        .into_iter()
        .map(|i| manifest.entries()[i].clone())
        .collect()
}

/// Stratified random holdout split.
///
/// Each class contributes `holdout_fraction` of its rows (at least one) to
/// the second partition; the rest stay in the first. Partitions are disjoint.
pub fn stratified_holdout(
    manifest: &Manifest,
    holdout_fraction: f64,
    seed: u64,
) -> Result<(Manifest, Manifest)> {
    if manifest.is_empty() {
        return Err(Error::Dataset("cannot split an empty manifest".to_string()));
    }
    if !(holdout_fraction > 0.0 && holdout_fraction < 1.0) {
        return Err(Error::InvalidArgument(format!(
            "holdout fraction must be in (0, 1), got {holdout_fraction}"
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut holdout = Vec::new();

    for (label, mut class_indices) in indices_by_class(manifest) {
        let n = class_indices.len();
        if n < 2 {
            return Err(Error::Dataset(format!(
                "class {label} has {n} sample(s); stratified holdout needs at least 2"
            )));
        }

        let n_holdout = ((n as f64 * holdout_fraction).round() as usize).clamp(1, n - 1);
        class_indices.shuffle(&mut rng);

        holdout.extend_from_slice(&class_indices[..n_holdout]);
        train.extend_from_slice(&class_indices[n_holdout..]);
    }

    Ok((take_rows(manifest, train), take_rows(manifest, holdout)))
}

/// Stratified k-fold splitter.
///
/// Shuffles each class once with the seed, deals its rows across the folds,
/// and yields per fold a disjoint (train, test) pair covering the manifest.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Result<Self> {
        if n_splits < 2 {
            return Err(Error::InvalidArgument(format!(
                "k-fold needs at least 2 splits, got {n_splits}"
            )));
        }
        Ok(Self { n_splits, seed })
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    pub fn split(&self, manifest: &Manifest) -> Result<Vec<(Manifest, Manifest)>> {
        if manifest.is_empty() {
            return Err(Error::Dataset("cannot split an empty manifest".to_string()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut fold_indices: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];

        for (label, mut class_indices) in indices_by_class(manifest) {
            if class_indices.len() < self.n_splits {
                return Err(Error::Dataset(format!(
                    "class {label} has {} sample(s); {} folds need at least {}",
                    class_indices.len(),
                    self.n_splits,
                    self.n_splits
                )));
            }

            class_indices.shuffle(&mut rng);
            for (i, idx) in class_indices.into_iter().enumerate() {
                fold_indices[i % self.n_splits].push(idx);
            }
        }

        let folds = (0..self.n_splits)
            .map(|test_fold| {
                let test = fold_indices[test_fold].clone();
                let train: Vec<usize> = fold_indices
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != test_fold)
                    .flat_map(|(_, idxs)| idxs.iter().copied())
                    .collect();
                (take_rows(manifest, train), take_rows(manifest, test))
            })
            .collect();

        Ok(folds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agc_core::ManifestEntry;
    use std::collections::HashMap;

    fn build_manifest(per_class: usize, classes: i64) -> Manifest {
        let mut entries = Vec::new();
        for class in 0..classes {
            for i in 0..per_class {
                entries.push(ManifestEntry::new(
                    format!("class_{class}/image_{i}.png"),
                    class,
                ));
            }
        }
        Manifest::new(entries)
    }

    fn class_counts(manifest: &Manifest) -> HashMap<i64, usize> {
        let mut counts = HashMap::new();
        for entry in manifest.entries() {
            *counts.entry(entry.label).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_holdout_preserves_class_proportions() {
        let manifest = build_manifest(100, 4);
        let (train, holdout) = stratified_holdout(&manifest, 0.10, 42).unwrap();

        assert_eq!(train.len() + holdout.len(), manifest.len());

        let holdout_counts = class_counts(&holdout);
        for class in 0..4 {
            assert_eq!(holdout_counts[&class], 10);
        }
    }

    #[test]
    fn test_holdout_partitions_are_disjoint() {
        let manifest = build_manifest(20, 2);
        let (train, holdout) = stratified_holdout(&manifest, 0.25, 7).unwrap();

        for entry in holdout.entries() {
            assert!(!train.entries().contains(entry));
        }
    }

    #[test]
    fn test_holdout_is_reproducible() {
        let manifest = build_manifest(30, 3);
        let (train_a, holdout_a) = stratified_holdout(&manifest, 0.10, 42).unwrap();
        let (train_b, holdout_b) = stratified_holdout(&manifest, 0.10, 42).unwrap();

        assert_eq!(train_a.entries(), train_b.entries());
        assert_eq!(holdout_a.entries(), holdout_b.entries());
    }

    #[test]
    fn test_holdout_rejects_tiny_classes() {
        let manifest = Manifest::new(vec![
            ManifestEntry::new("a.png", 0),
            ManifestEntry::new("b.png", 1),
            ManifestEntry::new("c.png", 1),
        ]);
        assert!(stratified_holdout(&manifest, 0.10, 42).is_err());
    }

    #[test]
    fn test_kfold_covers_manifest_once() {
        let manifest = build_manifest(25, 2);
        let folds = StratifiedKFold::new(5, 42).unwrap().split(&manifest).unwrap();

        assert_eq!(folds.len(), 5);

        let mut seen = 0;
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), manifest.len());
            for entry in test.entries() {
                assert!(!train.entries().contains(entry));
            }
            seen += test.len();
        }
        // Every row lands in exactly one test partition across the folds.
        assert_eq!(seen, manifest.len());
    }

    #[test]
    fn test_kfold_stratifies_each_test_partition() {
        let manifest = build_manifest(50, 2);
        let folds = StratifiedKFold::new(5, 42).unwrap().split(&manifest).unwrap();

        for (_, test) in &folds {
            let counts = class_counts(test);
            assert_eq!(counts[&0], 10);
            assert_eq!(counts[&1], 10);
        }
    }

    #[test]
    fn test_kfold_rejects_undersized_classes() {
        let manifest = build_manifest(3, 2);
        let kfold = StratifiedKFold::new(5, 42).unwrap();
        assert!(kfold.split(&manifest).is_err());
    }
}
