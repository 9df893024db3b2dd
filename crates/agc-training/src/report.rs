//! Per-sample classification reporting.
//!
//! Outcomes are appended to a plain-text report file, one padded line per
//! sample and a separator after each pass, and optionally echoed to the
//! console in green/red.

use agc_core::{Error, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

const FILENAME_WIDTH: usize = 105;
const SEPARATOR: &str = "------------------------------------------------";

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Append-only writer for per-sample classification outcomes.
pub struct ReportWriter {
    path: PathBuf,
    echo: bool,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>, echo: bool) -> Self {
        Self {
            path: path.into(),
            echo,
        }
    }

    /// Appends one pass of outcomes, then the separator line.
    pub fn append_outcomes(
        &self,
        filenames: &[String],
        expected: &[i64],
        predicted: &[i64],
    ) -> Result<()> {
        if filenames.len() != expected.len() || expected.len() != predicted.len() {
            return Err(Error::InvalidArgument(format!(
                "report rows out of step: {} filenames, {} expected, {} predicted",
                filenames.len(),
                expected.len(),
                predicted.len()
            )));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        for ((filename, e), p) in filenames.iter().zip(expected).zip(predicted) {
            let correct = e == p;
            let verdict = if correct { "Correct" } else { "Incorrect" };
            let line = format!(
                "{filename:<FILENAME_WIDTH$} -> True: {e} | Pred: {p} -> {verdict}"
            );
            writeln!(file, "{line}")?;

            if self.echo {
                let color = if correct { GREEN } else { RED };
                println!("{color}{line}{RESET}");
            }
        }
        writeln!(file, "{SEPARATOR}")?;

        Ok(())
    }
}
