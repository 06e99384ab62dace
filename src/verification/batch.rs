// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Batch conversion and verification over many meshes
//!
//! Each input is converted and verified on its own; one file's failure is
//! recorded and the batch moves on. Only failing to write the summary aborts
//! the batch.

use super::comparator::Tolerance;
use super::metrics::ArtifactMeasurer;
use super::reporter::{self, SUMMARY_FILE};
use super::verify::{verify_conversion, VerificationResult};
use crate::convert::{convert, ConvertOptions};
use crate::error::{Error, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

/// Batch settings
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub tolerance: Tolerance,
    pub convert: ConvertOptions,
    /// Process files on the rayon pool; result order is unchanged
    pub parallel: bool,
    /// Inputs under this directory keep their relative layout in the output
    pub input_root: Option<PathBuf>,
    pub show_progress: bool,
}

/// Per-file entry in the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub report: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Aggregate written to `batch_summary.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub results: BTreeMap<String, FileOutcome>,
}

/// What happened to one input
#[derive(Debug)]
pub struct BatchEntry {
    pub source: PathBuf,
    pub artifact: PathBuf,
    pub report: PathBuf,
    pub result: Result<VerificationResult>,
}

/// All entries in input order plus the persisted summary
#[derive(Debug)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
    pub summary: BatchSummary,
    pub summary_path: PathBuf,
}

impl BatchReport {
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0 && self.summary.errors == 0
    }
}

/// `*.stl` files under `dir` (case-insensitive), sorted
pub fn discover_meshes(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("stl"))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn relative_source(source: &Path, root: Option<&Path>) -> PathBuf {
    root.and_then(|r| source.strip_prefix(r).ok())
        .map(Path::to_path_buf)
        .or_else(|| source.file_name().map(PathBuf::from))
        .unwrap_or_else(|| source.to_path_buf())
}

/// Outputs are named after the path without extension, compared ignoring case
fn output_key(relative: &Path) -> String {
    relative.with_extension("").to_string_lossy().to_lowercase()
}

fn with_suffix(relative: &Path, n: usize) -> PathBuf {
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match relative.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    relative.with_file_name(name)
}

/// Relative output name per source, unique across the batch.
///
/// The first source to claim a name keeps it; later ones get `_1`, `_2`, ...
/// skipping any name another source already owns.
fn output_names(sources: &[PathBuf], root: Option<&Path>) -> Vec<PathBuf> {
    let natural: Vec<PathBuf> = sources.iter().map(|s| relative_source(s, root)).collect();
    let mut taken = HashSet::new();
    let owners: Vec<bool> = natural.iter().map(|r| taken.insert(output_key(r))).collect();

    natural
        .into_iter()
        .zip(owners)
        .zip(sources)
        .map(|((relative, owner), source)| {
            if owner {
                return relative;
            }
            let mut n = 1;
            let renamed = loop {
                let candidate = with_suffix(&relative, n);
                if taken.insert(output_key(&candidate)) {
                    break candidate;
                }
                n += 1;
            };
            warn!(
                source = %source.display(),
                output = %renamed.display(),
                "output name already used in this batch, renamed"
            );
            renamed
        })
        .collect()
}

fn process_one(
    source: &Path,
    relative: &Path,
    output_dir: &Path,
    options: &BatchOptions,
    measurer: &dyn ArtifactMeasurer,
) -> BatchEntry {
    let artifact = output_dir.join(relative.with_extension("scad"));
    let report = reporter::report_path(output_dir, relative);

    let result = convert(source, &artifact, &options.convert)
        .and_then(|_| {
            verify_conversion(
                source,
                Some(&artifact),
                &options.convert,
                &options.tolerance,
                measurer,
            )
        })
        .and_then(|result| reporter::write_json(&result, &report).map(|_| result));

    if let Err(e) = &result {
        warn!(source = %source.display(), stage = e.stage(), error = %e, "batch item failed");
    }

    BatchEntry {
        source: source.to_path_buf(),
        artifact,
        report,
        result,
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Convert and verify every source, writing artifacts and reports under `output_dir`
#[instrument(skip(sources, options, measurer), fields(files = sources.len(), output = %output_dir.display()))]
pub fn batch_verify(
    sources: &[PathBuf],
    output_dir: &Path,
    options: &BatchOptions,
    measurer: &dyn ArtifactMeasurer,
) -> Result<BatchReport> {
    options.tolerance.validate()?;
    std::fs::create_dir_all(output_dir).map_err(|source| Error::OutputWrite {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let names = output_names(sources, options.input_root.as_deref());
    let jobs: Vec<(&PathBuf, PathBuf)> = sources.iter().zip(names).collect();

    let progress = options.show_progress.then(|| progress_bar(sources.len()));
    let step = |(source, relative): &(&PathBuf, PathBuf)| {
        if let Some(pb) = &progress {
            pb.set_message(
                source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
        }
        let entry = process_one(source, relative, output_dir, options, measurer);
        if let Some(pb) = &progress {
            pb.inc(1);
        }
        entry
    };

    let entries: Vec<BatchEntry> = if options.parallel {
        jobs.par_iter().map(step).collect()
    } else {
        jobs.iter().map(step).collect()
    };

    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    let summary = summarize(&entries);
    let summary_path = output_dir.join(SUMMARY_FILE);
    reporter::write_json(&summary, &summary_path)?;

    info!(
        total = summary.total,
        passed = summary.passed,
        failed = summary.failed,
        errors = summary.errors,
        "batch complete"
    );

    Ok(BatchReport {
        entries,
        summary,
        summary_path,
    })
}

fn summarize(entries: &[BatchEntry]) -> BatchSummary {
    let mut summary = BatchSummary {
        total: entries.len(),
        ..BatchSummary::default()
    };

    for entry in entries {
        let key = entry.source.display().to_string();
        let outcome = match &entry.result {
            Ok(result) => {
                if result.passed {
                    summary.passed += 1;
                } else {
                    summary.failed += 1;
                }
                FileOutcome {
                    passed: result.passed,
                    report: Some(entry.report.clone()),
                    error: None,
                }
            }
            Err(e) => {
                summary.errors += 1;
                FileOutcome {
                    passed: false,
                    report: None,
                    error: Some(format!("error [{}]: {}", e.stage(), e)),
                }
            }
        };
        summary.results.insert(key, outcome);
    }

    summary
}
