// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Renderer gateway tests against scripted fake renderers

#![cfg(unix)]

use anyhow::Result;
use std::ffi::OsString;
use std::fs::File;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use stl2scad::geometry::unit_cube;
use stl2scad::openscad::{
    CommandBuilder, PosixRunner, ProcessRunner, QuoteStyle, RendererConfig, RendererGateway,
    RendererInvocation,
};
use stl2scad::verification::{ArtifactMeasurer, OpenScadMeasurer};
use stl2scad::{convert_mesh, ConvertOptions, Error};
use tempfile::TempDir;

const INFO_OK: &str = r#"if [ "$1" = "--info" ]; then echo "OpenSCAD Version: 2025.03.01"; exit 0; fi"#;

/// Write an executable shell script; names are unique per test so no two
/// tests exec the same file
fn fake_renderer(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n{}\n", INFO_OK, body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn gateway_for(executable: &Path) -> RendererGateway {
    let mut config = RendererConfig::default();
    config.executable = Some(executable.to_path_buf());
    config.timeout_secs = 10;
    RendererGateway::new(config)
}

/// Writes `contents` to the path following `-o`
fn write_output_body(contents: &str) -> String {
    format!(
        r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
printf '{}' > "$out""#,
        contents
    )
}

#[test]
fn test_locate_accepts_new_enough_renderer() {
    let dir = TempDir::new().unwrap();
    let exe = fake_renderer(dir.path(), "fake-openscad-locate", "exit 0");
    let gateway = gateway_for(&exe);

    assert_eq!(gateway.locate().unwrap(), exe);
    assert!(gateway.is_available());
}

#[test]
fn test_version_gate_rejects_old_renderer() {
    let dir = TempDir::new().unwrap();
    let exe = dir.path().join("fake-openscad-old");
    std::fs::write(&exe, "#!/bin/sh\necho 'OpenSCAD version 2021.01'\n").unwrap();
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

    match gateway_for(&exe).locate() {
        Err(Error::RendererVersion {
            found, required, ..
        }) => {
            assert_eq!(found, "2021.01");
            assert_eq!(required, "2025.02.19");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_successful_run_captures_log() -> Result<()> {
    let dir = TempDir::new()?;
    let exe = fake_renderer(dir.path(), "fake-openscad-ok", "echo 'rendering'; exit 0");
    let gateway = gateway_for(&exe);

    let log = dir.path().join("logs").join("job.log");
    let invocation = RendererInvocation::new("Render", Vec::new(), &log, Duration::from_secs(10));
    let output = gateway.execute(&invocation)?;

    assert!(output.status.success());
    assert!(output.log.contains("rendering"));
    assert!(log.is_file());
    assert!(gateway.run(&invocation));
    Ok(())
}

#[test]
fn test_non_zero_exit_is_failure_not_panic() {
    let dir = TempDir::new().unwrap();
    let exe = fake_renderer(
        dir.path(),
        "fake-openscad-fail",
        "echo 'ERROR: Parser error in line 3' 1>&2; exit 1",
    );
    let gateway = gateway_for(&exe);
    let invocation = RendererInvocation::new(
        "Render",
        Vec::new(),
        dir.path().join("fail.log"),
        Duration::from_secs(10),
    );

    assert!(!gateway.run(&invocation));
    let err = gateway.execute(&invocation).unwrap_err();
    assert_eq!(err.stage(), "render");
    assert!(err.to_string().contains("Parser error"));
}

#[test]
fn test_timeout_terminates_renderer() {
    let dir = TempDir::new().unwrap();
    let exe = fake_renderer(dir.path(), "fake-openscad-hang", "exec sleep 30");
    let gateway = gateway_for(&exe);
    let invocation = RendererInvocation::new(
        "Render",
        Vec::new(),
        dir.path().join("hang.log"),
        Duration::from_millis(300),
    );

    let start = Instant::now();
    let err = gateway.execute(&invocation).unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(err.to_string().contains("timed out"));
}

/// Delegates to the POSIX runner and records every sweep
struct RecordingRunner {
    sweeps: Arc<Mutex<Vec<PathBuf>>>,
    sweep_after_exit: bool,
}

impl ProcessRunner for RecordingRunner {
    fn spawn(&self, executable: &Path, args: &[OsString], log: &File) -> std::io::Result<Child> {
        PosixRunner.spawn(executable, args, log)
    }

    fn kill_tree(&self, child: &mut Child) {
        PosixRunner.kill_tree(child)
    }

    fn kill_by_name(&self, executable: &Path) {
        self.sweeps.lock().unwrap().push(executable.to_path_buf());
    }

    fn sweep_after_exit(&self) -> bool {
        self.sweep_after_exit
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Posix
    }
}

fn recording_gateway(exe: &Path, sweep_after_exit: bool) -> (RendererGateway, Arc<Mutex<Vec<PathBuf>>>) {
    let sweeps = Arc::new(Mutex::new(Vec::new()));
    let mut config = RendererConfig::default();
    config.executable = Some(exe.to_path_buf());
    let gateway = RendererGateway::with_runner(
        config,
        Box::new(RecordingRunner {
            sweeps: Arc::clone(&sweeps),
            sweep_after_exit,
        }),
    );
    (gateway, sweeps)
}

#[test]
fn test_timeout_sweeps_by_name() {
    let dir = TempDir::new().unwrap();
    let exe = fake_renderer(dir.path(), "fake-openscad-sweep", "exec sleep 30");
    let (gateway, sweeps) = recording_gateway(&exe, false);
    let invocation = RendererInvocation::new(
        "Render",
        Vec::new(),
        dir.path().join("sweep.log"),
        Duration::from_millis(200),
    )
    .with_executable(&exe);

    assert!(!gateway.run(&invocation));
    assert_eq!(*sweeps.lock().unwrap(), vec![exe]);
}

#[test]
fn test_clean_exit_sweeps_only_when_runner_asks() {
    let dir = TempDir::new().unwrap();
    let exe = fake_renderer(dir.path(), "fake-openscad-shim", "exit 0");
    let invocation = RendererInvocation::new(
        "Render",
        Vec::new(),
        dir.path().join("shim.log"),
        Duration::from_secs(10),
    )
    .with_executable(&exe);

    let (posix_like, sweeps) = recording_gateway(&exe, false);
    assert!(posix_like.run(&invocation));
    assert!(sweeps.lock().unwrap().is_empty());

    let (windows_like, sweeps) = recording_gateway(&exe, true);
    assert!(windows_like.run(&invocation));
    assert_eq!(sweeps.lock().unwrap().len(), 1);
}

/// `slow` hangs, `fast` finishes after a second
const SLOW_OR_FAST: &str = r#"case "$1" in
  slow) exec sleep 30 ;;
  fast) sleep 1 ;;
esac
exit 0"#;

#[test]
fn test_timeout_leaves_concurrent_job_running() {
    let dir = TempDir::new().unwrap();
    // Short enough that `pkill -x` would match the script's process name
    let exe = fake_renderer(dir.path(), "fakescad", SLOW_OR_FAST);
    let gateway = gateway_for(&exe);
    let slow = RendererInvocation::new(
        "Slow",
        vec!["slow".into()],
        dir.path().join("slow.log"),
        Duration::from_secs(1),
    );
    let fast = RendererInvocation::new(
        "Fast",
        vec!["fast".into()],
        dir.path().join("fast.log"),
        Duration::from_secs(10),
    );

    let (slow_ok, fast_ok) = std::thread::scope(|s| {
        let slow = s.spawn(|| gateway.run(&slow));
        std::thread::sleep(Duration::from_millis(500));
        let fast = s.spawn(|| gateway.run(&fast));
        (slow.join().unwrap(), fast.join().unwrap())
    });

    assert!(!slow_ok);
    assert!(fast_ok);
}

#[test]
fn test_exit_sweep_waits_for_last_job() {
    let dir = TempDir::new().unwrap();
    let exe = fake_renderer(dir.path(), "fakescad-sweep", SLOW_OR_FAST);
    let (gateway, sweeps) = recording_gateway(&exe, true);
    let invocation = |arg: &str| {
        RendererInvocation::new(
            "Render",
            vec![arg.into()],
            dir.path().join(format!("{}.log", arg)),
            Duration::from_secs(10),
        )
        .with_executable(&exe)
    };
    let (long, short) = (invocation("fast"), invocation("quick"));

    let (long_ok, short_ok) = std::thread::scope(|s| {
        let long = s.spawn(|| gateway.run(&long));
        std::thread::sleep(Duration::from_millis(200));
        let short = s.spawn(|| gateway.run(&short));
        (long.join().unwrap(), short.join().unwrap())
    });

    assert!(long_ok && short_ok);
    // Only the job that finished alone swept
    assert_eq!(*sweeps.lock().unwrap(), vec![exe]);
}

#[test]
fn test_render_png_passes_output_and_input() -> Result<()> {
    let dir = TempDir::new()?;
    let exe = fake_renderer(
        dir.path(),
        "fake-openscad-png",
        &write_output_body("PNG"),
    );
    let gateway = gateway_for(&exe);

    let scad = dir.path().join("part with space.scad");
    std::fs::write(&scad, "cube(1);")?;
    let png = dir.path().join("part.png");
    gateway.render_png(&scad, &png, &dir.path().join("png.log"))?;

    assert_eq!(std::fs::read_to_string(&png)?, "PNG");
    Ok(())
}

#[test]
fn test_measurer_parses_echo_output() -> Result<()> {
    let dir = TempDir::new()?;
    let exe = fake_renderer(
        dir.path(),
        "fake-openscad-metrics",
        &write_output_body(
            r#"ECHO: "VOLUME=1"\nECHO: "AREA=6"\nECHO: "BBOX_MIN=[0, 0, 0]"\nECHO: "BBOX_MAX=[1, 1, 1]"\n"#,
        ),
    );
    let gateway = gateway_for(&exe);

    let artifact = dir.path().join("cube.scad");
    convert_mesh(&unit_cube(), &artifact, &ConvertOptions::default())?;

    let metrics = OpenScadMeasurer::new(&gateway).measure_artifact(&artifact)?;
    assert_eq!(metrics.volume, Some(1.0));
    assert_eq!(metrics.surface_area, Some(6.0));
    let bbox = metrics.bounding_box.expect("bounding box reported");
    assert_eq!((bbox.width, bbox.height, bbox.depth), (1.0, 1.0, 1.0));
    Ok(())
}

#[test]
fn test_measurer_tolerates_missing_labels() -> Result<()> {
    let dir = TempDir::new()?;
    let exe = fake_renderer(
        dir.path(),
        "fake-openscad-partial",
        &write_output_body(r#"ECHO: "VOLUME=undef"\nWARNING: something\n"#),
    );
    let gateway = gateway_for(&exe);

    let artifact = dir.path().join("cube.scad");
    convert_mesh(&unit_cube(), &artifact, &ConvertOptions::default())?;

    let metrics = OpenScadMeasurer::new(&gateway).measure_artifact(&artifact)?;
    assert!(metrics.is_empty());
    Ok(())
}

#[test]
fn test_measurer_missing_artifact_is_render_error() {
    let dir = TempDir::new().unwrap();
    let exe = fake_renderer(dir.path(), "fake-openscad-unused", "exit 0");
    let gateway = gateway_for(&exe);

    let err = OpenScadMeasurer::new(&gateway)
        .measure_artifact(&dir.path().join("absent.scad"))
        .unwrap_err();
    assert_eq!(err.stage(), "render");
}

#[test]
fn test_command_builder_order() {
    let args = CommandBuilder::new()
        .arg("--render")
        .output("out.echo")
        .input("in.scad")
        .build();
    let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
    assert_eq!(args, vec!["--render", "-o", "out.echo", "in.scad"]);
}
