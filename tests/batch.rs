// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Batch verification tests

use anyhow::Result;
use nalgebra::Vector3;
use std::collections::BTreeSet;
use std::path::Path;
use stl2scad::geometry::{unit_cube, Primitive, RawMesh};
use stl2scad::verification::{
    batch_verify, discover_meshes, measure_mesh, BatchOptions, BatchSummary, MetricSet,
    VerificationResult, SUMMARY_FILE,
};
use tempfile::TempDir;

fn write_stl(path: &Path, mesh: &RawMesh) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let triangles: Vec<stl_io::Triangle> = mesh
        .iter()
        .map(|t| stl_io::Triangle {
            normal: stl_io::Normal::new([0.0, 0.0, 0.0]),
            vertices: t
                .vertices
                .map(|p| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32])),
        })
        .collect();
    let mut file = std::fs::File::create(path)?;
    stl_io::write_stl(&mut file, triangles.iter())?;
    Ok(())
}

/// Three valid meshes (one nested) and one corrupt file
fn populate(input: &Path) -> Result<()> {
    write_stl(&input.join("a_cube.stl"), &unit_cube())?;
    write_stl(
        &input.join("b_box.stl"),
        &Primitive::cube(Vector3::new(2.0, 3.0, 4.0), true).to_mesh(),
    )?;
    write_stl(
        &input.join("parts").join("c_ball.stl"),
        &Primitive::sphere(2.0, 16).to_mesh(),
    )?;
    std::fs::write(input.join("d_corrupt.stl"), "not an stl")?;
    Ok(())
}

/// Re-measures the emitted artifact by loading its source twin analytically
fn analytic_measurer(input: &Path) -> impl Fn(&Path) -> stl2scad::Result<MetricSet> + Send + Sync + '_ {
    move |artifact: &Path| {
        let name = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = discover_meshes(input)
            .into_iter()
            .find(|p| p.file_stem().map(|s| s.to_string_lossy() == name.as_str()).unwrap_or(false))
            .ok_or_else(|| stl2scad::Error::render_execution("Calculate metrics", "no source twin"))?;
        Ok(measure_mesh(&stl2scad::load_stl(&source)?))
    }
}

fn run(parallel: bool) -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    populate(input.path())?;

    let sources = discover_meshes(input.path());
    assert_eq!(sources.len(), 4);

    let options = BatchOptions {
        parallel,
        input_root: Some(input.path().to_path_buf()),
        ..BatchOptions::default()
    };
    let measurer = analytic_measurer(input.path());
    let report = batch_verify(&sources, output.path(), &options, &measurer)?;

    assert_eq!(report.entries.len(), 4);
    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.passed, 3);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.errors, 1);
    assert!(!report.all_passed());

    // Entries keep input order
    let order: Vec<_> = report.entries.iter().map(|e| e.source.clone()).collect();
    assert_eq!(order, sources);

    // Relative layout is preserved
    assert!(output.path().join("a_cube.scad").is_file());
    assert!(output.path().join("parts").join("c_ball.scad").is_file());
    let nested_report = output.path().join("parts").join("c_ball.verification.json");
    let result: VerificationResult =
        serde_json::from_str(&std::fs::read_to_string(&nested_report)?)?;
    assert!(result.passed);

    // Corrupt input leaves neither artifact nor report
    assert!(!output.path().join("d_corrupt.scad").exists());
    assert!(!output.path().join("d_corrupt.verification.json").exists());

    let summary: BatchSummary =
        serde_json::from_str(&std::fs::read_to_string(output.path().join(SUMMARY_FILE))?)?;
    assert_eq!(summary, report.summary);
    let corrupt = summary
        .results
        .iter()
        .find(|(file, _)| file.ends_with("d_corrupt.stl"))
        .map(|(_, outcome)| outcome)
        .expect("corrupt file recorded");
    assert!(!corrupt.passed);
    assert!(corrupt.report.is_none());
    assert!(corrupt.error.as_deref().unwrap_or("").starts_with("error [load]:"));

    Ok(())
}

#[test]
fn test_batch_isolates_corrupt_file() -> Result<()> {
    run(false)
}

#[test]
fn test_parallel_batch_matches_sequential() -> Result<()> {
    run(true)
}

#[test]
fn test_failed_verification_counted_separately() -> Result<()> {
    let input = TempDir::new()?;
    let output = TempDir::new()?;
    write_stl(&input.path().join("cube.stl"), &unit_cube())?;

    let measurer = |_: &Path| -> stl2scad::Result<MetricSet> {
        let mut metrics = measure_mesh(&unit_cube());
        metrics.volume = metrics.volume.map(|v| v * 2.0);
        Ok(metrics)
    };
    let sources = discover_meshes(input.path());
    let report = batch_verify(&sources, output.path(), &BatchOptions::default(), &measurer)?;

    assert_eq!(report.summary.total, 1);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.errors, 0);
    let entry = &report.entries[0];
    let result = entry.result.as_ref().expect("verified");
    assert!(!result.passed);
    assert!(entry.report.is_file());
    Ok(())
}

/// Every entry owns distinct artifact and report files, each naming its own source
fn assert_outputs_distinct(sources: &[std::path::PathBuf], options: BatchOptions) -> Result<()> {
    let output = TempDir::new()?;
    let measurer = |_: &Path| -> stl2scad::Result<MetricSet> { Ok(MetricSet::default()) };
    let report = batch_verify(sources, output.path(), &options, &measurer)?;

    assert_eq!(report.summary.total, sources.len());
    assert_eq!(report.summary.errors, 0);
    let reports: BTreeSet<_> = report.entries.iter().map(|e| e.report.clone()).collect();
    let artifacts: BTreeSet<_> = report.entries.iter().map(|e| e.artifact.clone()).collect();
    assert_eq!(reports.len(), sources.len());
    assert_eq!(artifacts.len(), sources.len());

    for entry in &report.entries {
        assert!(entry.artifact.is_file());
        let written: VerificationResult =
            serde_json::from_str(&std::fs::read_to_string(&entry.report)?)?;
        assert_eq!(written.source_file.as_deref(), Some(entry.source.as_path()));
        assert_eq!(written.artifact_file.as_deref(), Some(entry.artifact.as_path()));
    }
    Ok(())
}

#[test]
fn test_same_file_name_in_two_directories() -> Result<()> {
    let input = TempDir::new()?;
    let first = input.path().join("a").join("part.stl");
    let second = input.path().join("b").join("part.stl");
    write_stl(&first, &unit_cube())?;
    write_stl(&second, &Primitive::cube(Vector3::new(2.0, 3.0, 4.0), true).to_mesh())?;

    for parallel in [false, true] {
        let options = BatchOptions {
            parallel,
            ..BatchOptions::default()
        };
        assert_outputs_distinct(&[first.clone(), second.clone()], options)?;
    }
    Ok(())
}

#[cfg(target_os = "linux")]
#[test]
fn test_extension_case_variants_get_own_outputs() -> Result<()> {
    let input = TempDir::new()?;
    write_stl(&input.path().join("part.stl"), &unit_cube())?;
    write_stl(
        &input.path().join("part.STL"),
        &Primitive::cube(Vector3::new(2.0, 3.0, 4.0), true).to_mesh(),
    )?;

    let sources = discover_meshes(input.path());
    assert_eq!(sources.len(), 2);
    let options = BatchOptions {
        input_root: Some(input.path().to_path_buf()),
        ..BatchOptions::default()
    };
    assert_outputs_distinct(&sources, options)
}

#[test]
fn test_unusable_output_dir_is_fatal() -> Result<()> {
    let dir = TempDir::new()?;
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"x")?;

    let measurer = |_: &Path| -> stl2scad::Result<MetricSet> { Ok(MetricSet::default()) };
    let err = batch_verify(&[], &blocker, &BatchOptions::default(), &measurer).unwrap_err();
    assert_eq!(err.stage(), "write");
    Ok(())
}

#[test]
fn test_empty_batch_writes_empty_summary() -> Result<()> {
    let output = TempDir::new()?;
    let measurer = |_: &Path| -> stl2scad::Result<MetricSet> { Ok(MetricSet::default()) };
    let report = batch_verify(&[], output.path(), &BatchOptions::default(), &measurer)?;

    assert_eq!(report.summary.total, 0);
    assert!(report.all_passed());
    assert!(report.summary_path.is_file());
    Ok(())
}
