//! Shared plumbing for the workspace's tool binaries: logging setup and
//! TOML config loading.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{Error, Result};

/// Default log directives per verbosity level. Experiment runs are chatty
/// at debug (per-batch, per-fold detail), so image decoding noise from the
/// `image` crate is pinned to warn.
fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "debug,image=warn"
    } else {
        "info"
    }
}

/// Initializes tracing for a tool binary.
///
/// An explicit `RUST_LOG` wins; otherwise `verbose` picks between the
/// default directive sets. Errors if a subscriber is already installed.
pub fn setup_cli_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("cannot initialize logging: {e}")))
}

/// Reads and parses a TOML config file.
///
/// Both the read and the parse failure surface as [`Error::Config`] with
/// the offending path, so a tool can print one actionable message.
pub fn load_toml_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let text = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read config {}: {e}", path.display())))?;

    toml::from_str(&text)
        .map_err(|e| Error::Config(format!("cannot parse config {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExperimentConfig;
    use std::io::Write;

    #[test]
    fn test_load_toml_config_missing_file() {
        let result: Result<ExperimentConfig> =
            load_toml_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_toml_config_reads_experiment_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dataset = \"leaves\"\nfolds = 3").unwrap();

        let config: ExperimentConfig = load_toml_config(file.path()).unwrap();
        assert_eq!(config.dataset, "leaves");
        assert_eq!(config.folds, 3);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_load_toml_config_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dataset = [unclosed").unwrap();

        let result: Result<ExperimentConfig> = load_toml_config(file.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_default_directives_per_verbosity() {
        assert_eq!(default_directives(false), "info");
        assert!(default_directives(true).starts_with("debug"));
    }
}
