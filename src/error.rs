// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error taxonomy for conversion, rendering and verification

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the conversion and verification pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Mesh source could not be read or parsed, or contained no triangles
    #[error("failed to load mesh {}: {reason}", .path.display())]
    MeshLoad { path: PathBuf, reason: String },

    /// Mesh has no triangles to validate
    #[error("mesh is empty")]
    EmptyMesh,

    /// Edges shared by more than two triangles
    #[error("non-manifold edges found: {count} edges")]
    NonManifold { count: usize },

    /// No candidate renderer executable exists on this host
    #[error("OpenSCAD executable not found (searched: {})", display_paths(.searched))]
    RendererNotFound { searched: Vec<PathBuf> },

    /// A renderer was found but failed the version gate
    #[error("OpenSCAD at {} reports version {found}, required >= {required}{}", .path.display(), nightly_suffix(.nightly_required))]
    RendererVersion {
        path: PathBuf,
        found: String,
        required: String,
        nightly_required: bool,
    },

    /// The renderer process failed, exited non-zero or timed out
    #[error("{description} failed: {reason}")]
    RenderExecution { description: String, reason: String },

    /// Writing the converted artifact failed
    #[error("failed to write {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a verification report or summary failed
    #[error("failed to write report {}: {source}", .path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tolerance outside the accepted range
    #[error("invalid tolerance for {name}: {value}")]
    InvalidTolerance { name: &'static str, value: f64 },
}

impl Error {
    pub fn mesh_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MeshLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn render_execution(description: impl Into<String>, reason: impl ToString) -> Self {
        Self::RenderExecution {
            description: description.into(),
            reason: reason.to_string(),
        }
    }

    /// Pipeline stage that produced the error, used in one-line diagnostics
    pub fn stage(&self) -> &'static str {
        match self {
            Error::MeshLoad { .. } => "load",
            Error::EmptyMesh | Error::NonManifold { .. } => "validate",
            Error::RendererNotFound { .. } | Error::RendererVersion { .. } => "renderer",
            Error::RenderExecution { .. } => "render",
            Error::OutputWrite { .. } => "write",
            Error::ReportWrite { .. } => "report",
            Error::InvalidTolerance { .. } => "config",
        }
    }
}

fn nightly_suffix(nightly_required: &bool) -> &'static str {
    if *nightly_required {
        " (nightly build)"
    } else {
        ""
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
