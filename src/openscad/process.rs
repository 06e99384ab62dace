// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Platform process control for renderer runs
//!
//! The runner is chosen once per gateway; nothing downstream branches on the
//! host platform. A timed-out job only takes down the process tree it
//! spawned. Sweeping by executable name is reserved for moments when no other
//! job of the same gateway is running.

use super::command::QuoteStyle;
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const ETXTBSY: i32 = 26;

/// Spawns renderer processes and removes leftovers
pub trait ProcessRunner: Send + Sync {
    /// Start `executable` with stdout and stderr redirected into `log`
    fn spawn(&self, executable: &Path, args: &[OsString], log: &File) -> std::io::Result<Child>;

    /// Force-terminate `child` and everything it started
    fn kill_tree(&self, child: &mut Child);

    /// Force-terminate every process running `executable`'s image
    fn kill_by_name(&self, executable: &Path);

    /// Whether leftovers must be swept after a normal exit too
    fn sweep_after_exit(&self) -> bool {
        false
    }

    fn quote_style(&self) -> QuoteStyle;
}

/// Direct exec, no shell involved; each job leads its own process group
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixRunner;

impl ProcessRunner for PosixRunner {
    fn spawn(&self, executable: &Path, args: &[OsString], log: &File) -> std::io::Result<Child> {
        let mut attempt = 0;
        loop {
            let mut command = Command::new(executable);
            command
                .args(args)
                .stdin(Stdio::null())
                .stdout(log.try_clone()?)
                .stderr(log.try_clone()?);
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                command.process_group(0);
            }
            let result = command.spawn();
            match result {
                // ETXTBSY: the executable was just written and a forked child still holds it
                Err(e) if e.raw_os_error() == Some(ETXTBSY) && attempt < 5 => {
                    attempt += 1;
                    thread::sleep(Duration::from_millis(20));
                }
                other => return other,
            }
        }
    }

    fn kill_tree(&self, child: &mut Child) {
        // Group id equals the leader's pid, which stays valid until reaped.
        // Shell builtin: a standalone `kill` binary may be missing.
        sweep(
            "sh",
            &["-c".into(), format!("kill -s KILL -{}", child.id()).into()],
        );
        if let Err(e) = child.kill() {
            debug!(error = %e, "kill failed, process may have exited");
        }
    }

    fn kill_by_name(&self, executable: &Path) {
        if let Some(name) = executable.file_name() {
            sweep("pkill", &["-KILL".into(), "-x".into(), name.to_os_string()]);
        }
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Posix
    }
}

/// Windows console launch; the `.com` shim can leave the GUI image running
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsRunner;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

impl ProcessRunner for WindowsRunner {
    fn spawn(&self, executable: &Path, args: &[OsString], log: &File) -> std::io::Result<Child> {
        let mut command = Command::new(executable);
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            for arg in args {
                command.raw_arg(self.quote_style().quote(&arg.to_string_lossy()));
            }
            command.creation_flags(CREATE_NO_WINDOW);
        }
        #[cfg(not(windows))]
        command.args(args);

        command
            .stdin(Stdio::null())
            .stdout(log.try_clone()?)
            .stderr(log.try_clone()?)
            .spawn()
    }

    fn kill_tree(&self, child: &mut Child) {
        sweep(
            "taskkill",
            &["/F".into(), "/T".into(), "/PID".into(), child.id().to_string().into()],
        );
        if let Err(e) = child.kill() {
            debug!(error = %e, "kill failed, process may have exited");
        }
    }

    fn kill_by_name(&self, executable: &Path) {
        let mut images: Vec<OsString> = Vec::new();
        if let Some(name) = executable.file_name() {
            images.push(name.to_os_string());
        }
        if let Some(stem) = executable.file_stem() {
            let mut gui = stem.to_os_string();
            gui.push(".exe");
            if !images.contains(&gui) {
                images.push(gui);
            }
        }
        for image in images {
            sweep(
                "taskkill",
                &["/F".into(), "/T".into(), "/IM".into(), image],
            );
        }
    }

    fn sweep_after_exit(&self) -> bool {
        true
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Windows
    }
}

/// Runner for the current host
pub fn host_runner() -> Box<dyn ProcessRunner> {
    if cfg!(windows) {
        Box::new(WindowsRunner)
    } else {
        Box::new(PosixRunner)
    }
}

fn sweep(program: &str, args: &[OsString]) {
    match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => debug!(program, ?status, "process sweep"),
        Err(e) => debug!(program, error = %e, "process sweep unavailable"),
    }
}

/// Number of jobs currently running through one gateway
#[derive(Debug, Default)]
pub(crate) struct JobTracker {
    running: Mutex<usize>,
}

impl JobTracker {
    pub(crate) fn enter(&self) -> JobGuard<'_> {
        *self.running.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        JobGuard { tracker: self }
    }

    #[cfg(test)]
    pub(crate) fn running(&self) -> usize {
        *self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One running job; leaves the tracker on drop
pub(crate) struct JobGuard<'a> {
    tracker: &'a JobTracker,
}

impl JobGuard<'_> {
    /// Run `sweep` only when this is the sole running job. The count stays
    /// locked meanwhile, so no new job can spawn into the sweep.
    fn sweep_if_alone(&self, sweep: impl FnOnce()) -> bool {
        let running = self
            .tracker
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *running == 1 {
            sweep();
            true
        } else {
            debug!(running = *running, "skipping name sweep, other jobs in flight");
            false
        }
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        let mut running = self
            .tracker
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *running = running.saturating_sub(1);
    }
}

/// Spawn, poll until exit or `timeout`, and clean up on expiry
pub(crate) fn run_to_completion(
    runner: &dyn ProcessRunner,
    jobs: &JobTracker,
    description: &str,
    executable: &Path,
    args: &[OsString],
    log: &File,
    timeout: Duration,
) -> Result<(ExitStatus, Duration)> {
    let job = jobs.enter();
    let start = Instant::now();
    let mut child = runner
        .spawn(executable, args, log)
        .map_err(|e| Error::render_execution(description, format!("failed to start: {}", e)))?;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(e) => {
                terminate(runner, &job, &mut child, executable);
                return Err(Error::render_execution(description, e));
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            warn!(
                description,
                timeout_secs = timeout.as_secs_f64(),
                "renderer timed out, terminating"
            );
            terminate(runner, &job, &mut child, executable);
            return Err(Error::render_execution(
                description,
                format!("timed out after {:.1}s", timeout.as_secs_f64()),
            ));
        }

        thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
    };

    if runner.sweep_after_exit() {
        job.sweep_if_alone(|| runner.kill_by_name(executable));
    }

    Ok((status, start.elapsed()))
}

fn terminate(runner: &dyn ProcessRunner, job: &JobGuard<'_>, child: &mut Child, executable: &Path) {
    runner.kill_tree(child);
    let _ = child.wait();
    job.sweep_if_alone(|| runner.kill_by_name(executable));
}
