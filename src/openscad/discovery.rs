// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Renderer location and version gate

use super::config::RendererConfig;
use crate::error::{Error, Result};
use crate::io::find_version;
use std::path::{Path, PathBuf};

/// Where to look for a renderer on this host
#[derive(Debug, Clone, PartialEq)]
pub enum InstallLayout {
    /// Single install directory; both entry points must exist, the console one is run
    Bundle { gui: PathBuf, cli: PathBuf },
    /// Ordered list of executables, first acceptable wins
    Candidates(Vec<PathBuf>),
}

impl InstallLayout {
    /// Layout for the host platform; an explicit executable overrides both
    pub fn from_config(config: &RendererConfig) -> Self {
        if let Some(executable) = &config.executable {
            return InstallLayout::Candidates(vec![executable.clone()]);
        }
        if cfg!(windows) {
            let windows = &config.paths.windows;
            InstallLayout::Bundle {
                gui: windows.base.join(&windows.gui),
                cli: windows.base.join(&windows.cli),
            }
        } else {
            InstallLayout::Candidates(config.paths.candidates().to_vec())
        }
    }

    /// Every path probed, for diagnostics
    pub fn searched(&self) -> Vec<PathBuf> {
        match self {
            InstallLayout::Bundle { gui, cli } => vec![gui.clone(), cli.clone()],
            InstallLayout::Candidates(paths) => paths.clone(),
        }
    }

    /// Existing executables worth version-checking, in probe order
    pub fn present(&self) -> Vec<PathBuf> {
        match self {
            InstallLayout::Bundle { gui, cli } => {
                if gui.is_file() && cli.is_file() {
                    vec![cli.clone()]
                } else {
                    Vec::new()
                }
            }
            InstallLayout::Candidates(paths) => {
                paths.iter().filter(|p| p.is_file()).cloned().collect()
            }
        }
    }

    /// Only the bundle layout ships nightly builds under a fixed directory
    pub fn requires_nightly(&self) -> bool {
        matches!(self, InstallLayout::Bundle { .. })
    }
}

/// Compare the version reported in `info` against `required`.
///
/// `YYYY.MM.DD` tokens order correctly as plain strings.
pub fn check_version(
    path: &Path,
    info: &str,
    required: &str,
    nightly_required: bool,
) -> Result<String> {
    let found = find_version(info);
    let nightly_ok = !nightly_required || is_nightly(info);

    match found {
        Some(version) if version.as_str() >= required && nightly_ok => Ok(version),
        found => Err(Error::RendererVersion {
            path: path.to_path_buf(),
            found: found.unwrap_or_else(|| "unknown".to_string()),
            required: required.to_string(),
            nightly_required,
        }),
    }
}

fn is_nightly(info: &str) -> bool {
    let lower = info.to_lowercase();
    lower.contains("nightly") || lower.contains("dev")
}
