// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! OpenSCAD polyhedron exporter

use crate::error::{Error, Result};
use crate::geometry::WeldedGeometry;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Default convexity hint for the emitted polyhedron
pub const DEFAULT_CONVEXITY: u32 = 10;

/// Names the point and face lists are bound to in the artifact
pub const POINTS_NAME: &str = "stl_points";
pub const FACES_NAME: &str = "stl_faces";

const HEADER: &str = "// STL to SCAD Conversion";
const METADATA_ORDER: [&str; 4] = ["name", "volume", "surface_area", "bbox"];

/// Render the artifact text: metadata comments, point list, face list, polyhedron call
pub fn render_polyhedron(
    geometry: &WeldedGeometry,
    metadata: &BTreeMap<String, String>,
    convexity: u32,
) -> String {
    let mut out = String::with_capacity(64 + geometry.points.len() * 40 + geometry.faces.len() * 24);

    out.push_str(HEADER);
    out.push('\n');
    let known = METADATA_ORDER.iter().filter_map(|k| metadata.get_key_value(*k));
    let extra = metadata
        .iter()
        .filter(|(k, _)| !METADATA_ORDER.contains(&k.as_str()));
    for (key, value) in known.chain(extra) {
        // Comments are single-line
        let value = value.replace(['\n', '\r'], " ");
        let _ = writeln!(out, "// {}: {}", key, value);
    }
    out.push('\n');

    let _ = writeln!(out, "{} = [", POINTS_NAME);
    for p in &geometry.points {
        let _ = writeln!(out, "  [{:.6}, {:.6}, {:.6}],", p.x, p.y, p.z);
    }
    out.push_str("];\n\n");

    let _ = writeln!(out, "{} = [", FACES_NAME);
    for [a, b, c] in &geometry.faces {
        let _ = writeln!(out, "  [{}, {}, {}],", a, b, c);
    }
    out.push_str("];\n\n");

    let _ = writeln!(
        out,
        "polyhedron(points={}, faces={}, convexity={});",
        POINTS_NAME, FACES_NAME, convexity
    );
    out
}

/// Render and write the artifact; the final path never holds a partial file
pub fn write_polyhedron(
    path: &Path,
    geometry: &WeldedGeometry,
    metadata: &BTreeMap<String, String>,
    convexity: u32,
) -> Result<()> {
    let text = render_polyhedron(geometry, metadata, convexity);
    write_atomic(path, text.as_bytes()).map_err(|source| Error::OutputWrite {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = text.len(), "wrote polyhedron");
    Ok(())
}

/// Write through a temp file in the destination directory, then rename over `path`
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
