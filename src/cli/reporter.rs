// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CLI output reporter with colored formatting

use crate::convert::{ConversionStats, DebugArtifacts};
use crate::error::Error;
use crate::verification::{BatchReport, Comparison, MetricComparison, VerificationResult};
use colored::*;
use std::path::Path;
use std::time::Duration;

/// CLI reporter for formatted output
pub struct Reporter;

impl Reporter {
    fn rule() {
        println!("{}", "━".repeat(80).bright_black());
    }

    /// Report a finished conversion
    pub fn report_conversion(output: &Path, stats: &ConversionStats, duration: Duration) {
        println!();
        Self::rule();
        println!("{} {}", "Converted:".bold(), output.display().to_string().cyan());
        Self::rule();
        println!(
            "  {} {}",
            "Original vertices:".bright_black(),
            stats.original_vertex_count.to_string().cyan()
        );
        println!(
            "  {} {}",
            "Deduplicated vertices:".bright_black(),
            stats.deduplicated_vertex_count.to_string().cyan()
        );
        println!(
            "  {} {}",
            "Faces:".bright_black(),
            stats.face_count.to_string().cyan()
        );
        for (key, value) in &stats.metadata {
            println!("  {} {}", format!("{}:", key).bright_black(), value);
        }
        println!(
            "  {} {}",
            "Time:".bright_black(),
            Self::format_duration(duration).yellow()
        );
        Self::rule();
    }

    /// List files written by a debug conversion
    pub fn report_debug(artifacts: &DebugArtifacts) {
        for path in [&artifacts.analysis, &artifacts.preview, &artifacts.echo]
            .into_iter()
            .flatten()
        {
            Self::report_info(&format!("Debug artifact: {}", path.display()));
        }
    }

    /// Report a verification result with per-metric color coding
    pub fn report_verification(result: &VerificationResult) {
        println!();
        Self::rule();
        if let Some(source) = &result.source_file {
            println!("{} {}", "STL:".bold(), source.display().to_string().cyan());
        }
        if let Some(artifact) = &result.artifact_file {
            println!("{} {}", "SCAD:".bold(), artifact.display().to_string().cyan());
        }
        Self::rule();

        if result.passed {
            println!("{} {}", "✅".green(), "Verification passed".green().bold());
        } else {
            println!("{} {}", "❌".red(), "Verification failed".red().bold());
        }

        println!("\n{}", "Metrics:".bold());
        let tolerance = &result.tolerance;
        if let Some(c) = &result.comparison.volume {
            Self::print_metric("Volume", c, tolerance.volume_pct);
        }
        if let Some(c) = &result.comparison.surface_area {
            Self::print_metric("Surface area", c, tolerance.surface_area_pct);
        }
        if let Some(bbox) = &result.comparison.bounding_box {
            for (name, c) in bbox.dimensions() {
                Self::print_metric(&format!("BBox {}", name), c, tolerance.bbox_dimension_pct);
            }
        }
        if result.comparison == MetricComparison::default() {
            println!("  {}", "no metrics reported by the renderer".yellow());
        }

        if !result.failures.is_empty() {
            println!("\n{}", "Failures:".bold());
            for failure in &result.failures {
                println!("  {} {}", "-".red(), failure.message.red());
            }
        }
        Self::rule();
    }

    /// Report batch totals and the per-file errors
    pub fn report_batch(report: &BatchReport) {
        let summary = &report.summary;
        println!();
        Self::rule();
        println!("{}", "Batch summary".bold());
        Self::rule();
        println!(
            "  {} {}   {} {}   {} {}   {} {}",
            "Total:".bright_black(),
            summary.total,
            "Passed:".bright_black(),
            summary.passed.to_string().green(),
            "Failed:".bright_black(),
            summary.failed.to_string().red(),
            "Errors:".bright_black(),
            summary.errors.to_string().yellow()
        );
        for (file, outcome) in &summary.results {
            match &outcome.error {
                Some(error) => println!("  {} {} {}", "⚠️".yellow(), file, error.yellow()),
                None if !outcome.passed => println!("  {} {}", "❌".red(), file),
                None => {}
            }
        }
        println!(
            "  {} {}",
            "Summary:".bright_black(),
            report.summary_path.display()
        );
        Self::rule();
    }

    /// One-line diagnostic naming the failing stage
    pub fn report_error(error: &Error) {
        eprintln!("{}", Self::error_line(error).red().bold());
    }

    pub fn error_line(error: &Error) -> String {
        format!("error [{}]: {}", error.stage(), error)
    }

    /// Report warning
    pub fn report_warning(message: &str) {
        println!("\n{} {}", "⚠️  Warning:".yellow().bold(), message);
    }

    /// Report info
    pub fn report_info(message: &str) {
        println!("{} {}", "ℹ️".bright_blue(), message);
    }

    /// Print a metric, green within half the tolerance, yellow within it, red outside
    fn print_metric(name: &str, comparison: &Comparison, tolerance_pct: f64) {
        let pct = comparison.percent_difference.abs();
        let value = format!("{:.4} vs {:.4}", comparison.source, comparison.target);
        let formatted_value = if comparison.exceeds(tolerance_pct) {
            value.red()
        } else if pct <= tolerance_pct / 2.0 {
            value.green()
        } else {
            value.yellow()
        };

        println!(
            "  {} {} {}",
            format!("{}:", name).bright_black(),
            formatted_value,
            format!("(Δ{:.2}%, tol {:.2}%)", comparison.percent_difference, tolerance_pct)
                .bright_black()
        );
    }

    /// Format duration for display
    fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();

        if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", micros as f64 / 1_000_000.0)
        }
    }

    /// Print progress message
    pub fn progress(message: &str) {
        println!("{} {}...", "⏳".bright_blue(), message.bright_black());
    }

    /// Print success message
    pub fn success(message: &str) {
        println!("{} {}", "✅".green(), message.green());
    }
}
