// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! OpenSCAD renderer gateway
//!
//! Locates a suitable renderer, checks its version and runs single,
//! time-bounded jobs. Each `run`/`execute` call is exactly one attempt;
//! retries belong to the caller. One gateway may serve jobs from several
//! threads at once.

pub mod command;
pub mod config;
pub mod discovery;
pub mod process;

pub use command::{CommandBuilder, QuoteStyle};
pub use config::{RendererConfig, RendererPaths, WindowsPaths};
pub use discovery::InstallLayout;
pub use process::{host_runner, PosixRunner, ProcessRunner, WindowsRunner};

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// One renderer job
#[derive(Debug, Clone)]
pub struct RendererInvocation {
    pub description: String,
    pub args: Vec<OsString>,
    /// Receives the process's stdout and stderr; must be unique per concurrent job
    pub log_path: PathBuf,
    /// Skip location and run this executable
    pub executable: Option<PathBuf>,
    pub timeout: Duration,
}

impl RendererInvocation {
    pub fn new(
        description: impl Into<String>,
        args: Vec<OsString>,
        log_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            description: description.into(),
            args,
            log_path: log_path.into(),
            executable: None,
            timeout,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub status: ExitStatus,
    pub elapsed: Duration,
    /// Captured stdout and stderr
    pub log: String,
}

/// Locates, validates and runs the external renderer
pub struct RendererGateway {
    config: RendererConfig,
    runner: Box<dyn ProcessRunner>,
    located: Mutex<Option<PathBuf>>,
    jobs: process::JobTracker,
}

impl RendererGateway {
    pub fn new(config: RendererConfig) -> Self {
        Self::with_runner(config, host_runner())
    }

    pub fn with_runner(config: RendererConfig, runner: Box<dyn ProcessRunner>) -> Self {
        Self {
            config,
            runner,
            located: Mutex::new(None),
            jobs: process::JobTracker::default(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Default per-run timeout from configuration
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Path of an installed renderer that passes the version gate
    #[instrument(skip(self))]
    pub fn locate(&self) -> Result<PathBuf> {
        if let Ok(cached) = self.located.lock() {
            if let Some(path) = cached.as_ref() {
                return Ok(path.clone());
            }
        }

        let layout = InstallLayout::from_config(&self.config);
        let mut last_error = None;

        for candidate in layout.present() {
            match self.verify_version(&candidate, layout.requires_nightly()) {
                Ok(version) => {
                    info!(path = %candidate.display(), %version, "located OpenSCAD");
                    if let Ok(mut cached) = self.located.lock() {
                        *cached = Some(candidate.clone());
                    }
                    return Ok(candidate);
                }
                Err(e) => {
                    warn!(path = %candidate.display(), error = %e, "rejected OpenSCAD candidate");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::RendererNotFound {
            searched: layout.searched(),
        }))
    }

    pub fn is_available(&self) -> bool {
        self.locate().is_ok()
    }

    fn verify_version(&self, candidate: &Path, nightly_required: bool) -> Result<String> {
        let scratch = TempDir::new().map_err(|e| Error::render_execution("Version check", e))?;
        let invocation = RendererInvocation::new(
            "Version check",
            vec!["--info".into()],
            scratch.path().join("info.log"),
            VERSION_CHECK_TIMEOUT.min(self.timeout().max(Duration::from_secs(1))),
        )
        .with_executable(candidate);

        let output = self.execute(&invocation)?;
        discovery::check_version(
            candidate,
            &output.log,
            &self.config.required_version,
            nightly_required,
        )
    }

    /// Run one job to completion; non-zero exit and timeout are errors
    #[instrument(skip(self, invocation), fields(description = %invocation.description))]
    pub fn execute(&self, invocation: &RendererInvocation) -> Result<RunOutput> {
        let executable = match &invocation.executable {
            Some(path) => path.clone(),
            None => self.locate()?,
        };
        let description = invocation.description.as_str();

        debug!(
            command = %command::display_command(&executable, &invocation.args, self.runner.quote_style()),
            log = %invocation.log_path.display(),
            "running renderer"
        );

        if let Some(parent) = invocation.log_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::render_execution(description, e))?;
        }
        let log = File::create(&invocation.log_path)
            .map_err(|e| Error::render_execution(description, format!("log file: {}", e)))?;

        let (status, elapsed) = process::run_to_completion(
            self.runner.as_ref(),
            &self.jobs,
            description,
            &executable,
            &invocation.args,
            &log,
            invocation.timeout,
        )?;
        drop(log);

        let log = std::fs::read(&invocation.log_path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();

        if !status.success() {
            return Err(Error::render_execution(
                description,
                format!("{}{}", status, log_tail(&log)),
            ));
        }

        debug!(elapsed_ms = elapsed.as_millis() as u64, "renderer finished");
        Ok(RunOutput {
            status,
            elapsed,
            log,
        })
    }

    /// Single attempt; failures are logged and reported as `false`
    pub fn run(&self, invocation: &RendererInvocation) -> bool {
        match self.execute(invocation) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "renderer run failed");
                false
            }
        }
    }

    /// Render a PNG preview of a `.scad` file
    pub fn render_png(&self, scad: &Path, png: &Path, log_path: &Path) -> Result<RunOutput> {
        let args = CommandBuilder::new()
            .arg("--autocenter")
            .arg("--viewall")
            .arg_value("--imgsize", "800,600")
            .output(png)
            .input(scad)
            .build();
        self.execute(&RendererInvocation::new(
            "Render preview",
            args,
            log_path,
            self.timeout(),
        ))
    }

    /// Export the echo stream of a `.scad` file
    pub fn render_echo(&self, scad: &Path, echo: &Path, log_path: &Path) -> Result<RunOutput> {
        let args = CommandBuilder::new().output(echo).input(scad).build();
        self.execute(&RendererInvocation::new(
            "Export echo",
            args,
            log_path,
            self.timeout(),
        ))
    }
}

impl Default for RendererGateway {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

fn log_tail(log: &str) -> String {
    let lines: Vec<&str> = log.lines().filter(|l| !l.trim().is_empty()).collect();
    match lines.last() {
        Some(last) => format!(": {}", last.trim()),
        None => String::new(),
    }
}
