//! Metric math for classification experiments.
//!
//! This module provides:
//! - Accuracy, precision/recall/F-score (binary and macro averaging)
//! - Mean absolute error for ordinal label sets
//! - Confusion matrix and per-class accuracy
//! - Ranked average precision restricted to top-k pools
//! - Cross-fold metric aggregation

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// Top-k cutoffs used for ranked average precision reporting.
pub const DEFAULT_AP_KS: [usize; 4] = [50, 100, 250, 480];

/// Metrics for a single fold, tagged by classification mode.
///
/// Binary and multi-class runs report different metric sets; keeping them in
/// one tagged enum rules out key-presence ambiguity when folds are averaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FoldMetrics {
    Binary {
        accuracy: f64,
        precision: f64,
        recall: f64,
        f_score: f64,
    },
    MultiClass {
        accuracy: f64,
        precision_macro: f64,
        recall_macro: f64,
        f_score_macro: f64,
        mean_absolute_error: f64,
    },
}

impl FoldMetrics {
    pub fn accuracy(&self) -> f64 {
        match self {
            FoldMetrics::Binary { accuracy, .. } => *accuracy,
            FoldMetrics::MultiClass { accuracy, .. } => *accuracy,
        }
    }

    /// Headline F-score: binary F-score or the macro average.
    pub fn f_score(&self) -> f64 {
        match self {
            FoldMetrics::Binary { f_score, .. } => *f_score,
            FoldMetrics::MultiClass { f_score_macro, .. } => *f_score_macro,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, FoldMetrics::Binary { .. })
    }

    fn add(&self, other: &FoldMetrics) -> Result<FoldMetrics> {
        match (self, other) {
            (
                FoldMetrics::Binary {
                    accuracy: a1,
                    precision: p1,
                    recall: r1,
                    f_score: f1,
                },
                FoldMetrics::Binary {
                    accuracy: a2,
                    precision: p2,
                    recall: r2,
                    f_score: f2,
                },
            ) => Ok(FoldMetrics::Binary {
                accuracy: a1 + a2,
                precision: p1 + p2,
                recall: r1 + r2,
                f_score: f1 + f2,
            }),
            (
                FoldMetrics::MultiClass {
                    accuracy: a1,
                    precision_macro: p1,
                    recall_macro: r1,
                    f_score_macro: f1,
                    mean_absolute_error: m1,
                },
                FoldMetrics::MultiClass {
                    accuracy: a2,
                    precision_macro: p2,
                    recall_macro: r2,
                    f_score_macro: f2,
                    mean_absolute_error: m2,
                },
            ) => Ok(FoldMetrics::MultiClass {
                accuracy: a1 + a2,
                precision_macro: p1 + p2,
                recall_macro: r1 + r2,
                f_score_macro: f1 + f2,
                mean_absolute_error: m1 + m2,
            }),
            _ => Err(Error::InvalidArgument(
                "cannot aggregate binary and multi-class fold metrics together".to_string(),
            )),
        }
    }

    fn scale(&self, divisor: f64) -> FoldMetrics {
        match self {
            FoldMetrics::Binary {
                accuracy,
                precision,
                recall,
                f_score,
            } => FoldMetrics::Binary {
                accuracy: accuracy / divisor,
                precision: precision / divisor,
                recall: recall / divisor,
                f_score: f_score / divisor,
            },
            FoldMetrics::MultiClass {
                accuracy,
                precision_macro,
                recall_macro,
                f_score_macro,
                mean_absolute_error,
            } => FoldMetrics::MultiClass {
                accuracy: accuracy / divisor,
                precision_macro: precision_macro / divisor,
                recall_macro: recall_macro / divisor,
                f_score_macro: f_score_macro / divisor,
                mean_absolute_error: mean_absolute_error / divisor,
            },
        }
    }
}

/// Element-wise accumulator for per-fold metrics.
///
/// Rejects mixing binary and multi-class folds; `average` divides by the
/// number of folds added.
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    sum: Option<FoldMetrics>,
    folds: usize,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, fold: &FoldMetrics) -> Result<()> {
        self.sum = Some(match &self.sum {
            Some(sum) => sum.add(fold)?,
            None => fold.clone(),
        });
        self.folds += 1;
        Ok(())
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    pub fn average(&self) -> Result<FoldMetrics> {
        match &self.sum {
            Some(sum) => Ok(sum.scale(self.folds as f64)),
            None => Err(Error::InsufficientData(
                "no folds accumulated".to_string(),
            )),
        }
    }
}

/// Fraction of predictions equal to the expected labels.
pub fn accuracy_score(expected: &[i64], predicted: &[i64]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let correct = expected
        .iter()
        .zip(predicted.iter())
        .filter(|(e, p)| e == p)
        .count();
    correct as f64 / expected.len() as f64
}

/// Mean absolute error, treating labels as ordinal values.
pub fn mean_absolute_error(expected: &[i64], predicted: &[i64]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let sum: f64 = expected
        .iter()
        .zip(predicted.iter())
        .map(|(e, p)| (e - p).abs() as f64)
        .sum();
    sum / expected.len() as f64
}

/// Confusion matrix over the sorted union of labels seen in either sequence.
///
/// Rows index the expected label, columns the predicted one.
pub fn confusion_matrix(expected: &[i64], predicted: &[i64]) -> (Vec<i64>, Vec<Vec<usize>>) {
    let labels: Vec<i64> = expected
        .iter()
        .chain(predicted.iter())
        .copied()
        .collect::<BTreeSet<i64>>()
        .into_iter()
        .collect();

    let index_of = |label: i64| labels.binary_search(&label).expect("label in union");

    let mut matrix = vec![vec![0usize; labels.len()]; labels.len()];
    for (e, p) in expected.iter().zip(predicted.iter()) {
        matrix[index_of(*e)][index_of(*p)] += 1;
    }

    (labels, matrix)
}

/// Per-class accuracy: the diagonal of the row-normalized confusion matrix.
///
/// Classes without support in the expected labels are skipped rather than
/// normalized by zero.
pub fn accuracy_per_class(expected: &[i64], predicted: &[i64]) -> Vec<(i64, f64)> {
    let (labels, matrix) = confusion_matrix(expected, predicted);

    labels
        .iter()
        .zip(matrix.iter())
        .enumerate()
        .filter_map(|(i, (label, row))| {
            let support: usize = row.iter().sum();
            if support == 0 {
                None
            } else {
                Some((*label, row[i] as f64 / support as f64))
            }
        })
        .collect()
}

fn prf_for_label(
    expected: &[i64],
    predicted: &[i64],
    positive: i64,
) -> (f64, f64, f64) {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;

    for (e, p) in expected.iter().zip(predicted.iter()) {
        match (*e == positive, *p == positive) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        0.0
    };
    let f_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    (precision, recall, f_score)
}

/// Precision, recall and F-score with the positive class fixed to label 1.
pub fn precision_recall_fscore_binary(expected: &[i64], predicted: &[i64]) -> (f64, f64, f64) {
    prf_for_label(expected, predicted, 1)
}

/// Macro-averaged precision, recall and F-score over every label present in
/// either sequence.
pub fn precision_recall_fscore_macro(expected: &[i64], predicted: &[i64]) -> (f64, f64, f64) {
    let (labels, _) = confusion_matrix(expected, predicted);
    if labels.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let n = labels.len() as f64;
    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f_score = 0.0;
    for label in labels {
        let (p, r, f) = prf_for_label(expected, predicted, label);
        precision += p;
        recall += r;
        f_score += f;
    }

    (precision / n, recall / n, f_score / n)
}

/// Computes the per-fold metric set for the given classification mode.
pub fn compute_fold_metrics(
    expected: &[i64],
    predicted: &[i64],
    is_binary: bool,
) -> Result<FoldMetrics> {
    if expected.is_empty() {
        return Err(Error::InsufficientData(
            "no samples to compute metrics over".to_string(),
        ));
    }
    if expected.len() != predicted.len() {
        return Err(Error::InvalidArgument(format!(
            "expected {} labels but got {} predictions",
            expected.len(),
            predicted.len()
        )));
    }

    let accuracy = accuracy_score(expected, predicted);

    if is_binary {
        let (precision, recall, f_score) = precision_recall_fscore_binary(expected, predicted);
        Ok(FoldMetrics::Binary {
            accuracy,
            precision,
            recall,
            f_score,
        })
    } else {
        let (precision_macro, recall_macro, f_score_macro) =
            precision_recall_fscore_macro(expected, predicted);
        Ok(FoldMetrics::MultiClass {
            accuracy,
            precision_macro,
            recall_macro,
            f_score_macro,
            mean_absolute_error: mean_absolute_error(expected, predicted),
        })
    }
}

/// Average precision over a scored pool: the area under the precision-recall
/// curve traced by descending score thresholds.
pub fn average_precision_score(pool: &[(f32, i64)]) -> f64 {
    let positives = pool.iter().filter(|(_, label)| *label == 1).count();
    if positives == 0 {
        return 0.0;
    }

    let mut ranked: Vec<&(f32, i64)> = pool.iter().collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut tp = 0usize;
    let mut seen = 0usize;
    let mut prev_recall = 0.0;
    let mut ap = 0.0;

    let mut i = 0;
    while i < ranked.len() {
        // Consume the whole tie group before emitting a threshold point.
        let score = ranked[i].0;
        while i < ranked.len() && ranked[i].0 == score {
            if ranked[i].1 == 1 {
                tp += 1;
            }
            seen += 1;
            i += 1;
        }

        let precision = tp as f64 / seen as f64;
        let recall = tp as f64 / positives as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }

    ap
}

/// Ranked average precision report over a fixed set of top-k cutoffs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedAveragePrecision {
    /// (k, average precision restricted to the top k)
    pub per_k: Vec<(usize, f64)>,
    /// Mean across the computed cutoffs
    pub mean: f64,
}

/// Computes average precision restricted to the top-k scored samples for each
/// cutoff in `ks`.
///
/// The pool is sorted by descending score with a stable sort, so tied scores
/// keep their original order. Cutoffs larger than the pool are skipped with a
/// warning; an empty usable cutoff set or a pool without positives is an
/// `InsufficientData` error.
pub fn calculate_average_precision_ks(
    pool: &[(f32, i64)],
    ks: &[usize],
) -> Result<RankedAveragePrecision> {
    if !pool.iter().any(|(_, label)| *label == 1) {
        return Err(Error::InsufficientData(
            "ranked average precision needs at least one positive sample".to_string(),
        ));
    }

    let mut ranked: Vec<(f32, i64)> = pool.to_vec();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut per_k = Vec::new();
    for &k in ks {
        if k > ranked.len() {
            warn!(k, pool = ranked.len(), "skipping cutoff larger than pool");
            continue;
        }
        per_k.push((k, average_precision_score(&ranked[..k])));
    }

    if per_k.is_empty() {
        return Err(Error::InsufficientData(format!(
            "pool of {} samples is smaller than every requested cutoff",
            ranked.len()
        )));
    }

    let mean = per_k.iter().map(|(_, ap)| ap).sum::<f64>() / per_k.len() as f64;
    Ok(RankedAveragePrecision { per_k, mean })
}
