//! Mapping raw model outputs to labeled predictions.
//!
//! Model outputs index into the flow's encoded class table, not the label
//! space; everything here translates between the two before any metric or
//! report sees a value.

use agc_core::{Error, Result};
use agc_dataset::Flow;
use std::collections::BTreeMap;
use tracing::warn;

/// Decision threshold for binary sigmoid scores.
pub const BINARY_THRESHOLD: f32 = 0.5;

/// One test pass, expressed in the label space.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Per-sample confidence: probability of label 1 in binary mode, the
    /// winning class probability otherwise
    pub scores: Vec<f32>,
    /// Predicted labels
    pub predicted: Vec<i64>,
    /// Expected labels, recovered through the test flow's own class table
    pub expected: Vec<i64>,
}

fn invert_class_indices(class_indices: &BTreeMap<i64, usize>) -> Vec<i64> {
    let mut label_by_index = vec![0i64; class_indices.len()];
    for (label, index) in class_indices {
        label_by_index[*index] = *label;
    }
    label_by_index
}

/// Reorients binary sigmoid scores to mean "probability of label 1".
///
/// A binary head emits the probability of whichever class the flow encoded
/// as index 1. When the flow's table maps label 1 to index 0 the scores are
/// complemented (and the correction logged); a table that does not cover
/// labels 0 and 1 is a hard error rather than a silent misread.
pub fn align_binary_scores(
    scores: &mut [f32],
    class_indices: &BTreeMap<i64, usize>,
) -> Result<()> {
    let index_of_one = class_indices.get(&1).ok_or_else(|| {
        Error::LabelMapping("binary class table has no label 1".to_string())
    })?;
    if !class_indices.contains_key(&0) {
        return Err(Error::LabelMapping(
            "binary class table has no label 0".to_string(),
        ));
    }

    if *index_of_one == 0 {
        warn!("class table maps label 1 to index 0; complementing scores");
        for score in scores.iter_mut() {
            *score = 1.0 - *score;
        }
    }

    Ok(())
}

/// Translates one pass of raw model outputs into labeled predictions.
///
/// The model learned the training flow's class encoding, so its output
/// columns (and binary score orientation) are interpreted through
/// `train_flow`'s class table. The test flow only supplies the samples: its
/// iteration order must match `outputs`, one row per sample, and its own
/// table recovers the expected labels.
pub fn calculate_prediction(
    outputs: &[Vec<f32>],
    train_flow: &Flow,
    test_flow: &Flow,
) -> Result<Prediction> {
    let encoded = test_flow.classes();
    if outputs.len() != encoded.len() {
        return Err(Error::InvalidArgument(format!(
            "flow enumerates {} samples but the model produced {} rows",
            encoded.len(),
            outputs.len()
        )));
    }

    let test_labels = invert_class_indices(test_flow.class_indices());
    let label_by_index = invert_class_indices(train_flow.class_indices());

    let expected: Vec<i64> = encoded
        .iter()
        .map(|&index| test_labels[index as usize])
        .collect();

    if train_flow.mode().is_binary() {
        let mut scores: Vec<f32> = outputs
            .iter()
            .map(|row| {
                row.first().copied().ok_or_else(|| {
                    Error::Model("binary model produced an empty output row".to_string())
                })
            })
            .collect::<Result<_>>()?;

        align_binary_scores(&mut scores, train_flow.class_indices())?;

        let predicted = scores
            .iter()
            .map(|&score| i64::from(score > BINARY_THRESHOLD))
            .collect();

        Ok(Prediction {
            scores,
            predicted,
            expected,
        })
    } else {
        let mut scores = Vec::with_capacity(outputs.len());
        let mut predicted = Vec::with_capacity(outputs.len());

        for row in outputs {
            if row.len() != label_by_index.len() {
                return Err(Error::Model(format!(
                    "model output row has {} columns for {} classes",
                    row.len(),
                    label_by_index.len()
                )));
            }
            let (winner, &score) = row
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                .ok_or_else(|| {
                    Error::Model("categorical model produced an empty output row".to_string())
                })?;
            scores.push(score);
            predicted.push(label_by_index[winner]);
        }

        Ok(Prediction {
            scores,
            predicted,
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agc_core::{ClassMode, ExperimentConfig, ImageDimensions, Manifest, ManifestEntry};
    use agc_dataset::create_flow;

    fn flow_over(labels: &[i64], mode: ClassMode) -> Flow {
        let manifest: Manifest = labels
            .iter()
            .enumerate()
            .map(|(i, &label)| ManifestEntry::new(format!("img_{i}.png"), label))
            .collect();
        let config = ExperimentConfig {
            class_mode: mode,
            image_size: ImageDimensions::new(4, 4, 3),
            ..ExperimentConfig::default()
        };
        create_flow(&manifest, &config, 1, false, false).unwrap()
    }

    #[test]
    fn test_binary_prediction_thresholds_scores() {
        let train_flow = flow_over(&[0, 1, 0, 1], ClassMode::Binary);
        let test_flow = flow_over(&[1, 0, 1, 0], ClassMode::Binary);
        let outputs = vec![vec![0.9], vec![0.2], vec![0.4], vec![0.6]];

        let prediction = calculate_prediction(&outputs, &train_flow, &test_flow).unwrap();
        assert_eq!(prediction.expected, vec![1, 0, 1, 0]);
        assert_eq!(prediction.predicted, vec![1, 0, 0, 1]);
        assert_eq!(prediction.scores, vec![0.9, 0.2, 0.4, 0.6]);
    }

    #[test]
    fn test_binary_prediction_is_idempotent() {
        let train_flow = flow_over(&[0, 1], ClassMode::Binary);
        let test_flow = flow_over(&[1, 0, 0], ClassMode::Binary);
        let outputs = vec![vec![0.8], vec![0.3], vec![0.1]];

        let a = calculate_prediction(&outputs, &train_flow, &test_flow).unwrap();
        let b = calculate_prediction(&outputs, &train_flow, &test_flow).unwrap();
        assert_eq!(a.predicted, b.predicted);
        assert_eq!(a.scores, b.scores);
    }

    #[test]
    fn test_single_class_test_partition_uses_training_table() {
        // A fold's test partition can hold only positives; the training
        // flow still covers both labels, so alignment must not fail and the
        // scores must keep their "probability of label 1" meaning.
        let train_flow = flow_over(&[0, 1, 0, 1], ClassMode::Binary);
        let test_flow = flow_over(&[1, 1], ClassMode::Binary);
        let outputs = vec![vec![0.9], vec![0.8]];

        let prediction = calculate_prediction(&outputs, &train_flow, &test_flow).unwrap();
        assert_eq!(prediction.expected, vec![1, 1]);
        assert_eq!(prediction.predicted, vec![1, 1]);
        assert_eq!(prediction.scores, vec![0.9, 0.8]);
    }

    #[test]
    fn test_missing_test_class_keeps_training_width() {
        // The model emits one column per training class even when the test
        // partition is missing one; argmax maps through the training table.
        let train_flow = flow_over(&[0, 2, 4], ClassMode::Categorical);
        let test_flow = flow_over(&[0, 2], ClassMode::Categorical);
        let outputs = vec![vec![0.7, 0.2, 0.1], vec![0.1, 0.2, 0.7]];

        let prediction = calculate_prediction(&outputs, &train_flow, &test_flow).unwrap();
        assert_eq!(prediction.expected, vec![0, 2]);
        assert_eq!(prediction.predicted, vec![0, 4]);
    }

    #[test]
    fn test_align_complements_inverted_table() {
        // Label 1 encoded as index 0: the head's sigmoid means "label 0".
        let table: BTreeMap<i64, usize> = [(0, 1), (1, 0)].into_iter().collect();
        let mut scores = vec![0.9, 0.2];

        align_binary_scores(&mut scores, &table).unwrap();
        assert!((scores[0] - 0.1).abs() < 1e-6);
        assert!((scores[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_align_keeps_straight_table() {
        let table: BTreeMap<i64, usize> = [(0, 0), (1, 1)].into_iter().collect();
        let mut scores = vec![0.9, 0.2];

        align_binary_scores(&mut scores, &table).unwrap();
        assert_eq!(scores, vec![0.9, 0.2]);
    }

    #[test]
    fn test_align_rejects_foreign_labels() {
        let table: BTreeMap<i64, usize> = [(2, 0), (5, 1)].into_iter().collect();
        assert!(matches!(
            align_binary_scores(&mut [0.5], &table),
            Err(Error::LabelMapping(_))
        ));
    }

    #[test]
    fn test_categorical_prediction_takes_argmax() {
        let train_flow = flow_over(&[0, 2, 4], ClassMode::Categorical);
        let test_flow = flow_over(&[0, 2, 4], ClassMode::Categorical);
        let outputs = vec![
            vec![0.7, 0.2, 0.1],
            vec![0.1, 0.3, 0.6],
            vec![0.2, 0.5, 0.3],
        ];

        let prediction = calculate_prediction(&outputs, &train_flow, &test_flow).unwrap();
        // Argmax indices 0, 2, 1 map back to labels 0, 4, 2.
        assert_eq!(prediction.expected, vec![0, 2, 4]);
        assert_eq!(prediction.predicted, vec![0, 4, 2]);
        assert_eq!(prediction.scores, vec![0.7, 0.6, 0.5]);
    }

    #[test]
    fn test_rejects_row_count_mismatch() {
        let train_flow = flow_over(&[0, 1], ClassMode::Binary);
        let test_flow = flow_over(&[1, 0], ClassMode::Binary);
        assert!(matches!(
            calculate_prediction(&[vec![0.5]], &train_flow, &test_flow),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_rejects_misshapen_categorical_row() {
        let train_flow = flow_over(&[0, 1, 2], ClassMode::Categorical);
        let test_flow = flow_over(&[0, 1, 2], ClassMode::Categorical);
        let outputs = vec![vec![0.5, 0.5], vec![0.5, 0.5], vec![0.5, 0.5]];
        assert!(matches!(
            calculate_prediction(&outputs, &train_flow, &test_flow),
            Err(Error::Model(_))
        ));
    }
}
