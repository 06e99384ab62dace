// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! End-to-end conversion tests through real STL files

use anyhow::Result;
use approx::assert_relative_eq;
use nalgebra::Vector3;
use std::path::Path;
use stl2scad::geometry::analytics::analyze;
use stl2scad::geometry::{unit_cube, Primitive, RawMesh, Triangle};
use stl2scad::{convert, load_stl, ConvertOptions, Error, WeldStrategy};
use tempfile::TempDir;

fn write_binary_stl(path: &Path, mesh: &RawMesh) -> Result<()> {
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

fn write_ascii_stl(path: &Path, name: &str, mesh: &RawMesh) -> Result<()> {
    let mut text = format!("solid {}\n", name);
    for t in mesh.iter() {
        text.push_str("  facet normal 0 0 0\n    outer loop\n");
        for p in &t.vertices {
            text.push_str(&format!("      vertex {} {} {}\n", p.x, p.y, p.z));
        }
        text.push_str("    endloop\n  endfacet\n");
    }
    text.push_str(&format!("endsolid {}\n", name));
    std::fs::write(path, text)?;
    Ok(())
}

#[test]
fn test_unit_cube_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("cube.stl");
    let output = dir.path().join("cube.scad");
    write_binary_stl(&input, &unit_cube())?;

    let stats = convert(&input, &output, &ConvertOptions::default().with_tolerance(1e-6))?;

    assert_eq!(stats.original_vertex_count, 36);
    assert_eq!(stats.deduplicated_vertex_count, 8);
    assert_eq!(stats.face_count, 12);

    let volume: f64 = stats.metadata["volume"].parse()?;
    assert_relative_eq!(volume, 1.0, epsilon = 1e-6);
    let area: f64 = stats.metadata["surface_area"].parse()?;
    assert_relative_eq!(area, 6.0, epsilon = 1e-6);

    let text = std::fs::read_to_string(&output)?;
    assert!(text.starts_with("// STL to SCAD Conversion"));
    assert!(text.contains("stl_points = ["));
    assert!(text.contains("stl_faces = ["));
    assert!(text.trim_end().ends_with("polyhedron(points=stl_points, faces=stl_faces, convexity=10);"));

    Ok(())
}

#[test]
fn test_ascii_solid_name_lands_in_header() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("bracket.stl");
    let output = dir.path().join("bracket.scad");
    let mesh = Primitive::cube(Vector3::new(4.0, 2.0, 1.0), false).to_mesh();
    write_ascii_stl(&input, "bracket_v2", &mesh)?;

    let loaded = load_stl(&input)?;
    assert_eq!(loaded.name(), Some("bracket_v2"));
    assert_eq!(loaded.triangle_count(), 12);

    let stats = convert(&input, &output, &ConvertOptions::default())?;
    assert_eq!(stats.metadata.get("name").map(String::as_str), Some("bracket_v2"));
    assert!(std::fs::read_to_string(&output)?.contains("// name: bracket_v2"));

    Ok(())
}

#[test]
fn test_non_manifold_input_is_rejected_before_output() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("fins.stl");
    let output = dir.path().join("fins.scad");

    let fin = |tip: [f64; 3]| Triangle::from_coords([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], tip]);
    let mesh = RawMesh::new(vec![
        fin([0.0, 1.0, 0.0]),
        fin([0.0, -1.0, 0.0]),
        fin([0.0, 0.0, 1.0]),
    ]);
    write_binary_stl(&input, &mesh)?;

    let err = convert(&input, &output, &ConvertOptions::default()).unwrap_err();
    assert!(matches!(err, Error::NonManifold { count: 1 }));
    assert_eq!(err.stage(), "validate");
    assert!(!output.exists());

    Ok(())
}

#[test]
fn test_corrupt_input_is_load_error() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("broken.stl");
    let output = dir.path().join("broken.scad");
    std::fs::write(&input, "not an stl")?;

    let err = convert(&input, &output, &ConvertOptions::default()).unwrap_err();
    assert_eq!(err.stage(), "load");
    assert!(!output.exists());

    Ok(())
}

#[test]
fn test_sphere_conversion_preserves_triangles() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("sphere.stl");
    let output = dir.path().join("sphere.scad");
    let mesh = Primitive::sphere(5.0, 32).to_mesh();
    write_binary_stl(&input, &mesh)?;

    let linear = ConvertOptions {
        strategy: WeldStrategy::LinearScan,
        ..ConvertOptions::default()
    };
    let stats = convert(&input, &output, &linear)?;
    let source = analyze(&load_stl(&input)?);

    assert_eq!(stats.face_count, source.triangle_count);
    assert_eq!(stats.original_vertex_count, source.vertex_count);
    assert!(stats.deduplicated_vertex_count < stats.original_vertex_count / 3);

    Ok(())
}

#[test]
fn test_output_directory_is_created() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("cube.stl");
    let output = dir.path().join("nested").join("deeper").join("cube.scad");
    write_binary_stl(&input, &unit_cube())?;

    convert(&input, &output, &ConvertOptions::default())?;
    assert!(output.is_file());

    Ok(())
}
