// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Fidelity verification of converted artifacts
//!
//! The source mesh is measured analytically, the emitted artifact is measured
//! by the renderer, and the two metric sets are compared under percentage
//! tolerances.

pub mod batch;
pub mod comparator;
pub mod metrics;
pub mod reporter;
pub mod verify;

pub use batch::{batch_verify, discover_meshes, BatchEntry, BatchOptions, BatchReport, BatchSummary, FileOutcome};
pub use comparator::{
    compare_metrics, percent_difference, BoundingBoxComparison, Comparison, MetricComparison,
    Tolerance,
};
pub use metrics::{measure_mesh, ArtifactMeasurer, BoundingBoxMetrics, MetricSet, OpenScadMeasurer};
pub use reporter::{report_path, write_json, SUMMARY_FILE};
pub use verify::{file_sha256, verify, verify_conversion, Failure, VerificationResult};
