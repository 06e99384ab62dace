// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Tolerance checks over compared metrics

use super::comparator::{compare_metrics, extended_float, Comparison, MetricComparison, Tolerance};
use super::metrics::{measure_mesh, ArtifactMeasurer, MetricSet};
use crate::convert::{convert_mesh, ConvertOptions};
use crate::error::{Error, Result};
use crate::io;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{info, instrument};

/// One metric outside tolerance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub metric: String,
    /// Absolute percent difference
    #[serde(with = "extended_float")]
    pub difference_percent: f64,
    pub tolerance: f64,
    pub message: String,
}

impl Failure {
    fn new(metric: &str, label: &str, comparison: &Comparison, tolerance: f64) -> Self {
        let difference_percent = comparison.percent_difference.abs();
        Self {
            metric: metric.to_string(),
            difference_percent,
            tolerance,
            message: format!(
                "{} difference ({:.2}%) exceeds tolerance ({:.2}%)",
                label, difference_percent, tolerance
            ),
        }
    }
}

/// Outcome of comparing source and artifact metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub source_file: Option<PathBuf>,
    pub artifact_file: Option<PathBuf>,
    pub source_sha256: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub source_metrics: MetricSet,
    pub target_metrics: MetricSet,
    pub comparison: MetricComparison,
    pub tolerance: Tolerance,
    pub passed: bool,
    pub failures: Vec<Failure>,
    pub report: String,
}

impl VerificationResult {
    pub fn with_files(
        mut self,
        source: impl Into<PathBuf>,
        artifact: impl Into<PathBuf>,
        source_sha256: Option<String>,
    ) -> Self {
        self.source_file = Some(source.into());
        self.artifact_file = Some(artifact.into());
        self.source_sha256 = source_sha256;
        self.report = render_report(&self);
        self
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report)
    }
}

/// Compare two metric sets under `tolerance`; absent metrics are skipped
pub fn verify(source: &MetricSet, target: &MetricSet, tolerance: &Tolerance) -> VerificationResult {
    let comparison = compare_metrics(source, target);
    let mut failures = Vec::new();

    if let Some(c) = &comparison.volume {
        if c.exceeds(tolerance.volume_pct) {
            failures.push(Failure::new("volume", "Volume", c, tolerance.volume_pct));
        }
    }
    if let Some(c) = &comparison.surface_area {
        if c.exceeds(tolerance.surface_area_pct) {
            failures.push(Failure::new(
                "surface_area",
                "Surface area",
                c,
                tolerance.surface_area_pct,
            ));
        }
    }
    if let Some(bbox) = &comparison.bounding_box {
        for (dimension, c) in bbox.dimensions() {
            if c.exceeds(tolerance.bbox_dimension_pct) {
                failures.push(Failure::new(
                    &format!("bounding_box_{}", dimension),
                    &format!("Bounding box {}", dimension),
                    c,
                    tolerance.bbox_dimension_pct,
                ));
            }
        }
    }

    let mut result = VerificationResult {
        source_file: None,
        artifact_file: None,
        source_sha256: None,
        timestamp: Utc::now(),
        source_metrics: source.clone(),
        target_metrics: target.clone(),
        comparison,
        tolerance: *tolerance,
        passed: failures.is_empty(),
        failures,
        report: String::new(),
    };
    result.report = render_report(&result);
    result
}

fn render_report(result: &VerificationResult) -> String {
    let mut lines = vec![format!(
        "Verification {}",
        if result.passed { "PASSED" } else { "FAILED" }
    )];

    if let Some(source) = &result.source_file {
        lines.push(format!("STL: {}", source.display()));
    }
    if let Some(artifact) = &result.artifact_file {
        lines.push(format!("SCAD: {}", artifact.display()));
    }

    let line = |name: &str, c: &Comparison| {
        format!(
            "{}: STL={:.2}, SCAD={:.2}, Diff={:.2} ({:.2}%)",
            name, c.source, c.target, c.absolute_difference, c.percent_difference
        )
    };
    if let Some(c) = &result.comparison.volume {
        lines.push(line("Volume", c));
    }
    if let Some(c) = &result.comparison.surface_area {
        lines.push(line("Surface Area", c));
    }
    if let Some(bbox) = &result.comparison.bounding_box {
        let dims: Vec<String> = bbox
            .dimensions()
            .iter()
            .map(|(name, c)| format!("{}={:.2}%", capitalize(name), c.percent_difference))
            .collect();
        lines.push(format!("Bounding Box Diff: {}", dims.join(", ")));
    }

    for failure in &result.failures {
        lines.push(format!("  - {}", failure.message));
    }

    lines.join("\n")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Hex SHA-256 of a file's contents
pub fn file_sha256(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| Error::mesh_load(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify `source` against `artifact`, converting with `options` into a scratch
/// directory when no artifact is given
#[instrument(skip(options, tolerance, measurer), fields(source = %source.display()))]
pub fn verify_conversion(
    source: &Path,
    artifact: Option<&Path>,
    options: &ConvertOptions,
    tolerance: &Tolerance,
    measurer: &dyn ArtifactMeasurer,
) -> Result<VerificationResult> {
    tolerance.validate()?;
    let mesh = io::load_stl(source)?;
    let sha = file_sha256(source)?;

    let result = match artifact {
        Some(artifact) => {
            let target = measurer.measure_artifact(artifact)?;
            verify(&measure_mesh(&mesh), &target, tolerance).with_files(source, artifact, Some(sha))
        }
        None => {
            let scratch = TempDir::new().map_err(|source| Error::OutputWrite {
                path: std::env::temp_dir(),
                source,
            })?;
            let stem = source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "converted".to_string());
            let artifact = scratch.path().join(format!("{}.scad", stem));
            convert_mesh(&mesh, &artifact, options)?;
            let target = measurer.measure_artifact(&artifact)?;
            verify(&measure_mesh(&mesh), &target, tolerance).with_files(source, artifact, Some(sha))
        }
    };

    info!(passed = result.passed, failures = result.failures.len(), "verification complete");
    Ok(result)
}
