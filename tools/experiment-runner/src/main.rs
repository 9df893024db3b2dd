//! Attention-Guided Classification Experiment Runner
//!
//! Runs image-classification experiments over labeled dataset trees: a plain
//! train/test split, stratified k-fold cross-validation, or the dual-branch
//! attention-guided pipeline. Models come from the class-prior baseline
//! provider; swap in a real provider behind the same traits for actual
//! networks.

mod baseline;
mod cam;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use agc_core::cli::{load_toml_config, setup_cli_logging};
use agc_core::ExperimentConfig;
use agc_dataset::FsDatasetProvider;
use agc_training::driver::{run_attention_guided_cv, run_cross_validation, run_split};
use agc_training::ExperimentOutcome;
use baseline::PriorProvider;
use cam::CenterCropCam;

/// Runner configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunnerConfig {
    /// Root directory holding `<dataset>/{train,test}/<label>/` trees
    data_root: PathBuf,
    /// Experiment parameters
    experiment: ExperimentConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Train on the train partition, evaluate on the test partition
    Split,
    /// Stratified k-fold cross-validation
    Cv,
    /// Attention-guided dual-branch cross-validation
    Attention,
}

/// Attention-Guided Classification Experiment Runner
#[derive(Parser, Debug)]
#[command(
    name = "experiment-runner",
    about = "Run attention-guided classification experiments",
    long_about = "Run image-classification experiments over labeled dataset trees: \
                  train/test split, stratified cross-validation, or the dual-branch \
                  attention-guided pipeline."
)]
struct Args {
    /// Path to experiment configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Evaluation protocol
    #[arg(short, long, value_enum, default_value = "cv")]
    mode: Mode,

    /// Write the outcome as JSON to this path
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Dry run (validate config without running)
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_cli_logging(args.verbose)?;

    info!("Attention-Guided Classification Experiment Runner");
    info!("=================================================");

    let config: RunnerConfig =
        load_toml_config(&args.config).context("Failed to load experiment configuration")?;

    validate_config(&config)?;
    print_experiment_summary(&config, args.mode);

    if args.dry_run {
        info!("Configuration validated successfully (dry run)");
        return Ok(());
    }

    let datasets = FsDatasetProvider::new(&config.data_root);
    let models = PriorProvider;
    let cams = CenterCropCam::new();

    let outcome = match args.mode {
        Mode::Split => run_split(&config.experiment, &datasets, &models, &cams)?,
        Mode::Cv => run_cross_validation(&config.experiment, &datasets, &models, &cams)?,
        Mode::Attention => {
            run_attention_guided_cv(&config.experiment, &datasets, &models, &cams)?
        }
    };

    export_outcome(&outcome, args.output.as_deref())?;

    info!("Experiment completed successfully");
    Ok(())
}

fn validate_config(config: &RunnerConfig) -> Result<()> {
    if !config.data_root.exists() {
        anyhow::bail!(
            "Dataset root directory does not exist: {}",
            config.data_root.display()
        );
    }

    config
        .experiment
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid experiment configuration: {e}"))?;

    Ok(())
}

fn print_experiment_summary(config: &RunnerConfig, mode: Mode) {
    let experiment = &config.experiment;
    info!("");
    info!("Dataset: {} (root: {})", experiment.dataset, config.data_root.display());
    info!("Mode: {mode:?}");
    info!("Class mode: {}", experiment.class_mode);
    info!(
        "Folds: {} | Batch size: {} | Epochs: {} | Seed: {}",
        experiment.folds, experiment.batch_size, experiment.epochs, experiment.seed
    );
    info!(
        "Augmentation: {} | Validation fraction: {}",
        experiment.data_augmentation, experiment.validation_fraction
    );
    info!("Weights dir: {}", experiment.weights_dir.display());
    info!("");
}

fn export_outcome(outcome: &ExperimentOutcome, path: Option<&std::path::Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(outcome)?;

    if let Some(path) = path {
        std::fs::write(path, &json)
            .with_context(|| format!("Failed to write outcome to {}", path.display()))?;
        info!("Outcome saved to: {}", path.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
