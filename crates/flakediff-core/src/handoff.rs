//! Results handoff between the diff job and the comment job
//!
//! The diff job writes its results as a JSON array; the comment job reads
//! one file or every `*.json` file in a directory (several diff jobs may
//! have contributed one each).

use crate::errors::{FlakeDiffError, Result};
use crate::model::DiffResult;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

fn artifact_error(path: &Path, message: impl Into<String>) -> FlakeDiffError {
    FlakeDiffError::Artifact {
        name: path.display().to_string(),
        message: message.into(),
    }
}

/// Write `results` to `path` as a JSON array
///
/// # Errors
///
/// `Artifact` when encoding or writing fails.
pub fn write_results(path: &Path, results: &[DiffResult]) -> Result<()> {
    let encoded =
        serde_json::to_vec_pretty(results).map_err(|e| artifact_error(path, e.to_string()))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| artifact_error(path, e.to_string()))?;
        }
    }
    fs::write(path, encoded).map_err(|e| artifact_error(path, e.to_string()))
}

/// Read results from a file, or from every `*.json` file in a directory
///
/// Directory entries are read in file-name order and concatenated.
///
/// # Errors
///
/// `Artifact` when the path is missing, unreadable or not a result array.
pub fn read_results(path: &Path) -> Result<Vec<DiffResult>> {
    if !path.is_dir() {
        return read_results_file(path);
    }

    let entries = fs::read_dir(path).map_err(|e| artifact_error(path, e.to_string()))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(artifact_error(path, "directory contains no .json result files"));
    }

    let mut results = Vec::new();
    for file in &files {
        results.extend(read_results_file(file)?);
    }
    Ok(results)
}

fn read_results_file(path: &Path) -> Result<Vec<DiffResult>> {
    let raw = fs::read_to_string(path).map_err(|e| artifact_error(path, e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| artifact_error(path, e.to_string()))
}

/// Append a `name=value` step output to the host output file
///
/// Without an output file the value is only logged.
///
/// # Errors
///
/// `Io` when the output file cannot be written; `InvalidConfig` for
/// multi-line values.
pub fn write_output(output_file: Option<&Path>, name: &str, value: &str) -> Result<()> {
    if value.contains('\n') {
        return Err(FlakeDiffError::invalid_config(
            name,
            "output values must be single-line",
        ));
    }
    let Some(path) = output_file else {
        tracing::info!(output = name, value, "GITHUB_OUTPUT is not set");
        return Ok(());
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| FlakeDiffError::io("open_output_file", &e))?;
    writeln!(file, "{}={}", name, value).map_err(|e| FlakeDiffError::io("write_output", &e))
}
