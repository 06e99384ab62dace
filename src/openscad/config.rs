// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Renderer configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "STL2SCAD_CONFIG";

/// Windows install layout: one directory holding a GUI and a console entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowsPaths {
    pub base: PathBuf,
    pub gui: String,
    pub cli: String,
}

impl Default for WindowsPaths {
    fn default() -> Self {
        Self {
            base: PathBuf::from(r"C:\Program Files\OpenSCAD (Nightly)"),
            gui: "openscad.exe".to_string(),
            cli: "openscad.com".to_string(),
        }
    }
}

/// Per-platform install locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererPaths {
    pub windows: WindowsPaths,
    pub linux: Vec<PathBuf>,
    pub macos: Vec<PathBuf>,
}

impl Default for RendererPaths {
    fn default() -> Self {
        Self {
            windows: WindowsPaths::default(),
            linux: vec![
                PathBuf::from("/usr/bin/openscad"),
                PathBuf::from("/usr/local/bin/openscad"),
            ],
            macos: vec![PathBuf::from(
                "/Applications/OpenSCAD.app/Contents/MacOS/OpenSCAD",
            )],
        }
    }
}

impl RendererPaths {
    /// Ordered candidates for non-Windows hosts
    pub fn candidates(&self) -> &[PathBuf] {
        if cfg!(target_os = "macos") {
            &self.macos
        } else {
            &self.linux
        }
    }
}

/// OpenSCAD renderer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Minimum accepted `YYYY.MM.DD` release
    pub required_version: String,
    /// Default timeout for a single renderer run
    pub timeout_secs: u64,
    /// Explicit executable, skips the install-path probe
    pub executable: Option<PathBuf>,
    pub paths: RendererPaths,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            required_version: "2025.02.19".to_string(),
            timeout_secs: 60,
            executable: None,
            paths: RendererPaths::default(),
        }
    }
}

impl RendererConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: RendererConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load the user config file if one exists, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(default_config_path);

        let config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        Ok(config.with_env_overrides())
    }

    /// Apply `OPENSCAD_PATH`, `STL2SCAD_OPENSCAD_VERSION` and `STL2SCAD_RENDER_TIMEOUT`
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(openscad) = std::env::var_os("OPENSCAD_PATH") {
            if !openscad.is_empty() {
                self.executable = Some(PathBuf::from(openscad));
            }
        }

        if let Ok(version) = std::env::var("STL2SCAD_OPENSCAD_VERSION") {
            if !version.trim().is_empty() {
                self.required_version = version.trim().to_string();
            }
        }

        if let Ok(timeout) = std::env::var("STL2SCAD_RENDER_TIMEOUT") {
            if let Ok(secs) = timeout.trim().parse() {
                self.timeout_secs = secs;
            }
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `%APPDATA%\stl2scad\config.toml` on Windows, XDG config dir elsewhere
pub fn default_config_path() -> Option<PathBuf> {
    let dir = if cfg!(windows) {
        std::env::var_os("APPDATA").map(PathBuf::from)
    } else {
        std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
    }?;
    Some(dir.join("stl2scad").join("config.toml"))
}
