// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL importer

use crate::error::{Error, Result};
use crate::geometry::{RawMesh, Triangle};
use nalgebra::Point3;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use stl_io::read_stl;
use tracing::{debug, instrument};

const BINARY_HEADER_LEN: usize = 80;

/// Load a binary or ASCII STL file into a triangle soup
#[instrument]
pub fn load_stl(path: &Path) -> Result<RawMesh> {
    let bytes = fs::read(path).map_err(|e| Error::mesh_load(path, e))?;
    load_stl_bytes(&bytes).map_err(|e| match e {
        Error::MeshLoad { reason, .. } => Error::mesh_load(path, reason),
        other => other,
    })
}

/// Load STL data already held in memory
pub fn load_stl_bytes(bytes: &[u8]) -> Result<RawMesh> {
    let stl = read_stl(&mut Cursor::new(bytes)).map_err(|e| Error::mesh_load("<memory>", e))?;

    let point = |index: usize| -> Result<Point3<f64>> {
        let v = stl
            .vertices
            .get(index)
            .ok_or_else(|| Error::mesh_load("<memory>", format!("vertex index {index} out of range")))?;
        Ok(Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
    };

    let mut triangles = Vec::with_capacity(stl.faces.len());
    for face in &stl.faces {
        let [a, b, c] = face.vertices;
        triangles.push(Triangle::new(point(a)?, point(b)?, point(c)?));
    }

    if triangles.is_empty() {
        return Err(Error::mesh_load("<memory>", "no triangles"));
    }

    let name = solid_name(bytes);
    debug!(triangles = triangles.len(), name = ?name, "loaded STL");
    Ok(RawMesh::new(triangles).with_name(name))
}

fn is_ascii_stl(bytes: &[u8]) -> bool {
    if !bytes.starts_with(b"solid") {
        return false;
    }
    // Binary exporters sometimes begin the header with "solid" too
    let probe = &bytes[..bytes.len().min(1024)];
    String::from_utf8_lossy(probe).contains("facet")
}

/// Name from the `solid <name>` line, or the trimmed binary header
fn solid_name(bytes: &[u8]) -> Option<String> {
    let raw = if is_ascii_stl(bytes) {
        let line_end = bytes
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
            .unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..line_end]).into_owned()
    } else {
        let header = &bytes[..bytes.len().min(BINARY_HEADER_LEN)];
        String::from_utf8_lossy(header).into_owned()
    };

    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    let name = trimmed
        .strip_prefix("solid")
        .unwrap_or(trimmed)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace());

    if name.is_empty() || name.chars().any(|c| c.is_control()) {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ASCII_TRIANGLE: &str = "solid wedge
facet normal 0 0 1
  outer loop
    vertex 0 0 0
    vertex 1 0 0
    vertex 0 1 0
  endloop
endfacet
endsolid wedge
";

    #[test]
    fn test_ascii_stl_with_name() {
        let mesh = load_stl_bytes(ASCII_TRIANGLE.as_bytes()).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.name(), Some("wedge"));
        assert_eq!(mesh.triangles()[0].vertices[1], Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_binary_stl_roundtrip() {
        let triangles = vec![stl_io::Triangle {
            normal: stl_io::Normal::new([0.0, 0.0, 1.0]),
            vertices: [
                stl_io::Vertex::new([0.0, 0.0, 0.0]),
                stl_io::Vertex::new([2.0, 0.0, 0.0]),
                stl_io::Vertex::new([0.0, 2.0, 0.0]),
            ],
        }];
        let mut bytes = Vec::new();
        stl_io::write_stl(&mut bytes, triangles.iter()).unwrap();

        let mesh = load_stl_bytes(&bytes).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.name(), None);
        assert!((mesh.surface_area() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_garbage_is_mesh_load_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not an stl").unwrap();
        let err = load_stl(file.path()).unwrap_err();
        assert!(matches!(err, Error::MeshLoad { ref path, .. } if path.as_path() == file.path()));
    }

    #[test]
    fn test_missing_file_is_mesh_load_error() {
        let err = load_stl(Path::new("/nonexistent/part.stl")).unwrap_err();
        assert_eq!(err.stage(), "load");
    }

    #[test]
    fn test_empty_ascii_solid_rejected() {
        let err = load_stl_bytes(b"solid empty\nendsolid empty\n").unwrap_err();
        assert_eq!(err.stage(), "load");
    }
}
