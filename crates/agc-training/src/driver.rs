//! Experiment drivers.
//!
//! Three entry points, one per evaluation protocol:
//! - [`run_split`]: train on the train partition, score the test partition
//! - [`run_cross_validation`]: stratified k-fold over the train partition
//! - [`run_attention_guided_cv`]: k-fold over the dual-branch architecture,
//!   where a model trained on full images steers attention crops for a
//!   second branch and a fusion head consumes both

use crate::checkpoint::WeightsLayout;
use crate::model::{CamProvider, ModelProvider, PredictiveModel, TrainContext};
use crate::prediction::{calculate_prediction, Prediction};
use crate::report::ReportWriter;
use agc_core::metrics::{
    self, FoldMetrics, MetricsAccumulator, RankedAveragePrecision, DEFAULT_AP_KS,
};
use agc_core::{Branch, Error, ExperimentConfig, Result};
use agc_dataset::{
    create_flow, training_validation_flows, DatasetProvider, Flow, FusedFlow, StratifiedKFold,
};
use serde::Serialize;
use tracing::{info, warn};

/// Final result of one driver run.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentOutcome {
    /// Metrics of the run: a single fold's, or the cross-fold average
    pub metrics: FoldMetrics,
    /// Ranked average precision over the pooled test scores; binary runs
    /// only, and absent when the pool cannot support any cutoff
    pub ranked_ap: Option<RankedAveragePrecision>,
}

/// Trains on the train partition and scores the held-out test partition once.
pub fn run_split<D, P, C>(
    config: &ExperimentConfig,
    datasets: &D,
    models: &P,
    cams: &C,
) -> Result<ExperimentOutcome>
where
    D: DatasetProvider,
    P: ModelProvider,
    C: CamProvider<P::Model>,
{
    config.validate().map_err(Error::Config)?;
    let layout = WeightsLayout::from_config(config);

    let train_manifest = datasets.train_dataset_info(&config.dataset)?;
    let test_manifest = datasets.test_dataset_info(&config.dataset)?;
    info!(
        dataset = %config.dataset,
        train = train_manifest.len(),
        test = test_manifest.len(),
        "running train/test split experiment"
    );

    let (mut train_flow, mut validation_flow) = training_validation_flows(&train_manifest, config)?;
    let context = TrainContext {
        config,
        branch: Branch::Global,
        weights_path: layout.run_weights(&config.dataset, Some("split")),
    };
    let model = models.train_or_load(&context, &mut train_flow, &mut validation_flow)?;

    let mut test_flow = create_flow(&test_manifest, config, 1, false, false)?;
    let prediction = evaluate(&model, &train_flow, &mut test_flow)?;
    report_pass(config, &test_flow.filenames(), &prediction)?;

    let fold_metrics = metrics::compute_fold_metrics(
        &prediction.expected,
        &prediction.predicted,
        config.class_mode.is_binary(),
    )?;
    log_results("split", &fold_metrics);

    let ranked_ap = if config.class_mode.is_binary() {
        ranked_average_precision(&binary_pool(&prediction))?
    } else {
        None
    };

    cams.draw_class_activation_map(&model, &test_manifest, &config.cams_dir.join(&config.dataset))?;
    drop(model);

    Ok(ExperimentOutcome {
        metrics: fold_metrics,
        ranked_ap,
    })
}

/// Stratified k-fold cross-validation over the train partition.
///
/// Per-fold metrics are averaged element-wise; in binary mode the test scores
/// of every fold are pooled for one ranked-average-precision report.
pub fn run_cross_validation<D, P, C>(
    config: &ExperimentConfig,
    datasets: &D,
    models: &P,
    cams: &C,
) -> Result<ExperimentOutcome>
where
    D: DatasetProvider,
    P: ModelProvider,
    C: CamProvider<P::Model>,
{
    config.validate().map_err(Error::Config)?;
    let layout = WeightsLayout::from_config(config);

    let manifest = datasets.train_dataset_info(&config.dataset)?;
    let kfold = StratifiedKFold::new(config.folds, config.seed)?;
    info!(
        dataset = %config.dataset,
        folds = config.folds,
        samples = manifest.len(),
        "running cross-validation experiment"
    );

    let mut accumulator = MetricsAccumulator::new();
    let mut pool = Vec::new();

    for (fold, (train, test)) in kfold.split(&manifest)?.into_iter().enumerate() {
        let fold_no = fold + 1;
        info!(fold = fold_no, folds = config.folds, "starting fold");

        let (mut train_flow, mut validation_flow) = training_validation_flows(&train, config)?;
        let context = TrainContext {
            config,
            branch: Branch::Global,
            weights_path: layout.fold_weights(&config.dataset, Some("cv"), fold_no, config.folds),
        };
        let model = models.train_or_load(&context, &mut train_flow, &mut validation_flow)?;

        let mut test_flow = create_flow(&test, config, 1, false, false)?;
        let prediction = evaluate(&model, &train_flow, &mut test_flow)?;

        let fold_metrics = metrics::compute_fold_metrics(
            &prediction.expected,
            &prediction.predicted,
            config.class_mode.is_binary(),
        )?;
        log_fold_results(fold_no, &fold_metrics);
        report_pass(config, &test_flow.filenames(), &prediction)?;

        cams.draw_class_activation_map(
            &model,
            &test,
            &cam_fold_dir(config, fold_no),
        )?;
        // Each fold trains a fresh model; release this one before the next.
        drop(model);

        accumulator.add(&fold_metrics)?;
        if config.class_mode.is_binary() {
            pool.extend(binary_pool(&prediction));
        }
    }

    let averaged = accumulator.average()?;
    log_results("cross-validation average", &averaged);

    let ranked_ap = if config.class_mode.is_binary() {
        ranked_average_precision(&pool)?
    } else {
        None
    };

    Ok(ExperimentOutcome {
        metrics: averaged,
        ranked_ap,
    })
}

/// Cross-validated dual-branch experiment.
///
/// Per fold: train a global model on full images and evaluate it, crop every
/// image around the global model's strongest activation, train and evaluate
/// a local model on the crops, then train a fusion head over both branches
/// and score the test rows through a fused flow. Only the fused stage feeds
/// the cross-fold average and the score pool.
pub fn run_attention_guided_cv<D, P, C>(
    config: &ExperimentConfig,
    datasets: &D,
    models: &P,
    cams: &C,
) -> Result<ExperimentOutcome>
where
    D: DatasetProvider,
    P: ModelProvider,
    C: CamProvider<P::Model>,
{
    config.validate().map_err(Error::Config)?;
    let layout = WeightsLayout::from_config(config);

    let manifest = datasets.train_dataset_info(&config.dataset)?;
    let kfold = StratifiedKFold::new(config.folds, config.seed)?;
    info!(
        dataset = %config.dataset,
        folds = config.folds,
        samples = manifest.len(),
        "running attention-guided cross-validation experiment"
    );

    let mut accumulator = MetricsAccumulator::new();
    let mut pool = Vec::new();

    for (fold, (train, test)) in kfold.split(&manifest)?.into_iter().enumerate() {
        let fold_no = fold + 1;
        info!(fold = fold_no, folds = config.folds, "starting fold");

        // Global branch over the full images.
        let (mut train_flow_1, mut validation_flow_1) =
            training_validation_flows(&train, config)?;
        let global_context = TrainContext {
            config,
            branch: Branch::Global,
            weights_path: layout.fold_weights(
                &config.dataset,
                Some("attention_guided_global_branch_cv"),
                fold_no,
                config.folds,
            ),
        };
        let global_model =
            models.train_or_load(&global_context, &mut train_flow_1, &mut validation_flow_1)?;

        let mut test_flow_1 = create_flow(&test, config, 1, false, false)?;
        log_stage(
            config,
            "global branch",
            fold_no,
            &evaluate(&global_model, &train_flow_1, &mut test_flow_1)?,
        )?;

        // Attention crops steered by the global branch.
        let crop_dir = config
            .crops_dir
            .join(&config.dataset)
            .join(format!("fold_{fold_no}"));
        let cropped_test =
            cams.crop_to_attention(&global_model, &test, &crop_dir.join("test"))?;
        let cropped_train =
            cams.crop_to_attention(&global_model, &train, &crop_dir.join("train"))?;

        // Local branch over the crops. The cropped manifest keeps the
        // original row order and labels, so flows built with the shared seed
        // enumerate in lockstep with the full-image flows.
        let (mut train_flow_2, mut validation_flow_2) =
            training_validation_flows(&cropped_train, config)?;
        let local_context = TrainContext {
            config,
            branch: Branch::Local,
            weights_path: layout.fold_weights(
                &config.dataset,
                Some("attention_guided_local_branch_cv"),
                fold_no,
                config.folds,
            ),
        };
        let local_model =
            models.train_or_load(&local_context, &mut train_flow_2, &mut validation_flow_2)?;

        let mut test_flow_2 = create_flow(&cropped_test, config, 1, false, false)?;
        log_stage(
            config,
            "local branch",
            fold_no,
            &evaluate(&local_model, &train_flow_2, &mut test_flow_2)?,
        )?;

        // Fusion head over both branches.
        let fused_context = TrainContext {
            config,
            branch: Branch::Fused,
            weights_path: layout.fold_weights(
                &config.dataset,
                Some("attention_guided_all_cv"),
                fold_no,
                config.folds,
            ),
        };
        let fused_model = {
            let mut fused_train = FusedFlow::new(&mut train_flow_1, &mut train_flow_2);
            let mut fused_validation =
                FusedFlow::new(&mut validation_flow_1, &mut validation_flow_2);
            let train_steps = fused_train.steps();
            let validation_steps = fused_validation.steps();
            models.train_or_load_fused(
                &fused_context,
                (&global_model, &local_model),
                &mut fused_train,
                train_steps,
                &mut fused_validation,
                validation_steps,
            )?
        };
        drop(local_model);
        drop(global_model);

        // Fused test pass; labels and filenames come from the first branch's
        // flow, and its step count fixes the pass length. The fusion head
        // learned the first training flow's class encoding.
        let outputs = {
            let mut fused_test = FusedFlow::new(&mut test_flow_1, &mut test_flow_2);
            let steps = fused_test.steps();
            fused_model.predict_fused(&mut fused_test, steps)?
        };
        let prediction = calculate_prediction(&outputs, &train_flow_1, &test_flow_1)?;

        let fold_metrics = metrics::compute_fold_metrics(
            &prediction.expected,
            &prediction.predicted,
            config.class_mode.is_binary(),
        )?;
        info!(fold = fold_no, "fused model results");
        log_fold_results(fold_no, &fold_metrics);
        report_pass(config, &test_flow_1.filenames(), &prediction)?;

        cams.draw_class_activation_map(&fused_model, &test, &cam_fold_dir(config, fold_no))?;
        drop(fused_model);

        accumulator.add(&fold_metrics)?;
        if config.class_mode.is_binary() {
            pool.extend(binary_pool(&prediction));
        }
    }

    let averaged = accumulator.average()?;
    log_results("attention-guided average", &averaged);

    let ranked_ap = if config.class_mode.is_binary() {
        ranked_average_precision(&pool)?
    } else {
        None
    };

    Ok(ExperimentOutcome {
        metrics: averaged,
        ranked_ap,
    })
}

/// One full prediction pass over a batch-1 test flow. The model's outputs
/// are decoded through the class table of the flow it trained on.
fn evaluate<M: PredictiveModel>(
    model: &M,
    train_flow: &Flow,
    test_flow: &mut Flow,
) -> Result<Prediction> {
    let outputs = model.predict(test_flow)?;
    calculate_prediction(&outputs, train_flow, test_flow)
}

fn cam_fold_dir(config: &ExperimentConfig, fold_no: usize) -> std::path::PathBuf {
    config
        .cams_dir
        .join(&config.dataset)
        .join(format!("fold_{fold_no}"))
}

/// Abridged per-stage reporting for intermediate branch models.
fn log_stage(
    config: &ExperimentConfig,
    stage: &str,
    fold_no: usize,
    prediction: &Prediction,
) -> Result<()> {
    let fold_metrics = metrics::compute_fold_metrics(
        &prediction.expected,
        &prediction.predicted,
        config.class_mode.is_binary(),
    )?;
    info!(
        stage,
        fold = fold_no,
        accuracy = fold_metrics.accuracy(),
        f_score = fold_metrics.f_score(),
        "branch results"
    );
    log_per_class(prediction);
    Ok(())
}

/// Per-pass reporting: per-class accuracies to the log, per-sample outcomes
/// to the report file when configured.
fn report_pass(
    config: &ExperimentConfig,
    filenames: &[String],
    prediction: &Prediction,
) -> Result<()> {
    log_per_class(prediction);

    if config.print_classifications {
        let writer = ReportWriter::new(&config.report_path, true);
        writer.append_outcomes(filenames, &prediction.expected, &prediction.predicted)?;
    }

    Ok(())
}

fn log_per_class(prediction: &Prediction) {
    for (label, accuracy) in
        metrics::accuracy_per_class(&prediction.expected, &prediction.predicted)
    {
        info!(label, accuracy, "per-class accuracy");
    }
}

/// Abridged fold summary: accuracy and the headline F-score.
fn log_fold_results(fold_no: usize, fold_metrics: &FoldMetrics) {
    info!(
        fold = fold_no,
        accuracy = fold_metrics.accuracy(),
        f_score = fold_metrics.f_score(),
        "fold results"
    );
}

/// Full metric set, used for final (averaged) results.
fn log_results(scope: &str, fold_metrics: &FoldMetrics) {
    match fold_metrics {
        FoldMetrics::Binary {
            accuracy,
            precision,
            recall,
            f_score,
        } => info!(
            scope,
            accuracy = *accuracy,
            precision = *precision,
            recall = *recall,
            f_score = *f_score,
            "classification metrics"
        ),
        FoldMetrics::MultiClass {
            accuracy,
            precision_macro,
            recall_macro,
            f_score_macro,
            mean_absolute_error,
        } => info!(
            scope,
            accuracy = *accuracy,
            precision_macro = *precision_macro,
            recall_macro = *recall_macro,
            f_score_macro = *f_score_macro,
            mean_absolute_error = *mean_absolute_error,
            "classification metrics"
        ),
    }
}

/// (score, 0/1 truth) pairs for the ranked-average-precision pool.
fn binary_pool(prediction: &Prediction) -> Vec<(f32, i64)> {
    prediction
        .scores
        .iter()
        .zip(&prediction.expected)
        .map(|(&score, &expected)| (score, i64::from(expected == 1)))
        .collect()
}

/// Ranked AP over the pooled scores; a pool too small for every cutoff is
/// logged and skipped rather than failing the run.
fn ranked_average_precision(pool: &[(f32, i64)]) -> Result<Option<RankedAveragePrecision>> {
    match metrics::calculate_average_precision_ks(pool, &DEFAULT_AP_KS) {
        Ok(report) => {
            for (k, ap) in &report.per_k {
                info!(k, average_precision = ap, "ranked average precision");
            }
            info!(mean = report.mean, "mean ranked average precision");
            Ok(Some(report))
        }
        Err(Error::InsufficientData(reason)) => {
            warn!(%reason, "skipping ranked average precision");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
