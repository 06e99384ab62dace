// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Persisted verification reports

use crate::error::{Error, Result};
use crate::io::write_atomic;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the aggregate batch summary
pub const SUMMARY_FILE: &str = "batch_summary.json";

/// Report written next to a converted artifact: `part.stl` → `part.verification.json`
pub fn report_path(artifact_dir: &Path, relative_source: &Path) -> PathBuf {
    artifact_dir.join(relative_source.with_extension("verification.json"))
}

/// Write any serializable report as pretty JSON, atomically
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(|e| Error::ReportWrite {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    write_atomic(path, &json).map_err(|source| Error::ReportWrite {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "wrote report");
    Ok(())
}
