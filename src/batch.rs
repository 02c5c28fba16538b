//! Batch compression of files and directories.
//!
//! Takes a list of paths, compresses every image found, and writes the
//! results under an output directory with the same relative layout:
//!
//! ```text
//! photos/                         shrunk/
//! ├── beach.jpg      (14 MB)  →   ├── photos/beach.jpg   (1920px, 2.1 MB)
//! ├── notes.txt                   ├── photos/trip/map.png (passthrough)
//! └── trip/                       └── report.json
//!     └── map.png    (300 KB)
//! ```
//!
//! Directories are walked recursively and only files with a compiled-in
//! decoder are picked up; files named explicitly are always tried. The output
//! directory itself is never walked.
//!
//! ## Parallel Processing
//!
//! Files are independent, so they are compressed in parallel with
//! [rayon](https://docs.rs/rayon). Each call to
//! [`compress`](crate::imaging::compress) stays sequential. One file failing
//! is recorded in the report and does not stop the others.

use crate::imaging::{
    CompressError, CompressOptions, CompressionReport, ImageBackend, ImageFile, compress,
    supported_input_extensions,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use walkdir::WalkDir;

/// Name of the JSON report written into the output directory.
pub const REPORT_FILENAME: &str = "report.json";

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Compression failed: {0}")]
    Compress(#[from] CompressError),
    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),
    #[error("Two inputs would both be written to {0}")]
    DuplicateOutput(PathBuf),
}

/// A file to compress and where its output goes, relative to the output dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInput {
    pub path: PathBuf,
    pub relative: PathBuf,
}

/// Progress reported while a batch runs, one event per finished file.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Compressed {
        index: usize,
        source: String,
        output: String,
        report: CompressionReport,
    },
    Failed {
        index: usize,
        source: String,
        error: String,
    },
}

/// Outcome for one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<CompressionReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate numbers over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchTotals {
    pub files: usize,
    pub passthrough: usize,
    pub reencoded: usize,
    pub over_budget: usize,
    pub failed: usize,
    pub input_bytes: u64,
    pub output_bytes: u64,
}

/// Everything a batch produced, in input order. Serialized as `report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub totals: BatchTotals,
}

impl BatchReport {
    fn from_files(files: Vec<FileReport>) -> Self {
        let mut totals = BatchTotals {
            files: files.len(),
            ..BatchTotals::default()
        };
        for file in &files {
            match &file.report {
                Some(report) => {
                    totals.input_bytes += report.original_bytes as u64;
                    totals.output_bytes += report.output_bytes as u64;
                    if report.is_passthrough() {
                        totals.passthrough += 1;
                    } else {
                        totals.reencoded += 1;
                    }
                    if !report.within_budget {
                        totals.over_budget += 1;
                    }
                }
                None => totals.failed += 1,
            }
        }
        Self { files, totals }
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// True when `entry` is the directory `skip`, however either path is spelled.
fn is_skipped_dir(entry: &walkdir::DirEntry, skip: Option<&Path>) -> bool {
    let Some(skip) = skip else {
        return false;
    };
    entry.file_type().is_dir()
        && entry
            .path()
            .canonicalize()
            .is_ok_and(|path| path == skip)
}

/// Expand `paths` into the list of files to compress.
///
/// A file keeps only its name as relative path; files found in a directory
/// keep the directory's name plus their path inside it. Anything under
/// `skip` (the output directory) is ignored. Results are sorted per directory.
///
/// Two inputs mapping to the same relative path are rejected with
/// [`BatchError::DuplicateOutput`].
pub fn collect_inputs(paths: &[PathBuf], skip: &Path) -> Result<Vec<BatchInput>, BatchError> {
    // A missing output directory cannot contain any input
    let skip = skip.canonicalize().ok();
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_file() {
            let name = path
                .file_name()
                .ok_or_else(|| BatchError::InputNotFound(path.clone()))?;
            inputs.push(BatchInput {
                path: path.clone(),
                relative: PathBuf::from(name),
            });
            continue;
        }
        if !path.is_dir() {
            return Err(BatchError::InputNotFound(path.clone()));
        }

        let prefix = path.file_name().map(PathBuf::from).unwrap_or_default();
        let walker = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_skipped_dir(e, skip.as_deref()));
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || !has_supported_extension(entry.path()) {
                continue;
            }
            let inner = entry.path().strip_prefix(path).unwrap_or(entry.path());
            inputs.push(BatchInput {
                path: entry.path().to_path_buf(),
                relative: prefix.join(inner),
            });
        }
    }

    let mut seen = HashSet::new();
    for input in &inputs {
        if !seen.insert(input.relative.as_path()) {
            return Err(BatchError::DuplicateOutput(input.relative.clone()));
        }
    }
    Ok(inputs)
}

fn compress_to_disk(
    backend: &impl ImageBackend,
    input: &BatchInput,
    output_dir: &Path,
    options: &CompressOptions,
) -> Result<(PathBuf, CompressionReport), BatchError> {
    let file = ImageFile::open(&input.path)?;
    let compressed = compress(backend, &file, options)?;

    let dest = output_dir.join(&input.relative);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&dest, compressed.blob.bytes())?;
    Ok((dest, compressed.report))
}

/// Compress every input into `output_dir` and write `report.json` there.
///
/// `options` are validated up front so a bad request fails the whole batch
/// instead of every file.
pub fn run(
    backend: &impl ImageBackend,
    inputs: &[BatchInput],
    output_dir: &Path,
    options: &CompressOptions,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchReport, BatchError> {
    options.validate()?;
    std::fs::create_dir_all(output_dir)?;

    let files: Vec<FileReport> = inputs
        .par_iter()
        .enumerate()
        .map(|(index, input)| {
            let source = input.path.display().to_string();
            match compress_to_disk(backend, input, output_dir, options) {
                Ok((dest, report)) => {
                    let output = dest.display().to_string();
                    if let Some(tx) = &events {
                        tx.send(BatchEvent::Compressed {
                            index,
                            source: source.clone(),
                            output: output.clone(),
                            report: report.clone(),
                        })
                        .ok();
                    }
                    FileReport {
                        source,
                        output: Some(output),
                        report: Some(report),
                        error: None,
                    }
                }
                Err(e) => {
                    let error = e.to_string();
                    if let Some(tx) = &events {
                        tx.send(BatchEvent::Failed {
                            index,
                            source: source.clone(),
                            error: error.clone(),
                        })
                        .ok();
                    }
                    FileReport {
                        source,
                        output: None,
                        report: None,
                        error: Some(error),
                    }
                }
            }
        })
        .collect();

    let report = BatchReport::from_files(files);
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(output_dir.join(REPORT_FILENAME), json)?;
    Ok(report)
}
