// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL to OpenSCAD conversion pipeline
//!
//! load → validate → weld → build faces → optimize → emit. Validation runs
//! before anything is written, so a rejected mesh never leaves an artifact
//! behind. The renderer is never needed for conversion itself.

use crate::error::{Error, Result};
use crate::geometry::{analytics, manifold, weld, GeometryStats, RawMesh, WeldStrategy, WeldedGeometry};
use crate::io::{self, DEFAULT_CONVEXITY};
use crate::openscad::RendererGateway;
use crate::verification::metrics::{measure_mesh, MetricSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Knobs for one conversion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Relative weld tolerance
    pub tolerance: f64,
    pub strategy: WeldStrategy,
    pub convexity: u32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            tolerance: weld::DEFAULT_TOLERANCE,
            strategy: WeldStrategy::default(),
            convexity: DEFAULT_CONVEXITY,
        }
    }
}

impl ConvertOptions {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Counts and metadata for a finished conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub original_vertex_count: usize,
    pub deduplicated_vertex_count: usize,
    pub face_count: usize,
    pub metadata: BTreeMap<String, String>,
}

/// Convert the STL at `input` into a polyhedron artifact at `output`
#[instrument(skip(options), fields(input = %input.display(), output = %output.display()))]
pub fn convert(input: &Path, output: &Path, options: &ConvertOptions) -> Result<ConversionStats> {
    let mesh = io::load_stl(input)?;
    convert_mesh(&mesh, output, options)
}

/// Convert an already loaded mesh
pub fn convert_mesh(mesh: &RawMesh, output: &Path, options: &ConvertOptions) -> Result<ConversionStats> {
    manifold::validate(mesh)?;

    let geometry = WeldedGeometry::from_points(&mesh.points(), options.tolerance, options.strategy)?;
    let metadata = mesh.metadata();
    io::write_polyhedron(output, &geometry, &metadata, options.convexity)?;

    let stats = ConversionStats {
        original_vertex_count: mesh.vertex_count(),
        deduplicated_vertex_count: geometry.vertex_count(),
        face_count: geometry.face_count(),
        metadata,
    };
    info!(
        original = stats.original_vertex_count,
        deduplicated = stats.deduplicated_vertex_count,
        faces = stats.face_count,
        "conversion complete"
    );
    Ok(stats)
}

/// Stats plus analytic metrics, written as `<stem>_analysis.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionAnalysis {
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: ConvertOptions,
    pub stats: ConversionStats,
    pub metrics: MetricSet,
    pub geometry: GeometryStats,
}

/// Files produced by a debug conversion
#[derive(Debug, Clone, Default)]
pub struct DebugArtifacts {
    pub analysis: Option<PathBuf>,
    pub preview: Option<PathBuf>,
    pub echo: Option<PathBuf>,
}

/// Convert, then write debug artifacts next to `output`.
///
/// The analysis file is always written. The preview and echo renders need a
/// renderer; when none is usable only the debug step fails and the converted
/// artifact stays in place.
pub fn convert_with_debug(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
    gateway: &RendererGateway,
) -> Result<(ConversionStats, DebugArtifacts)> {
    let mesh = io::load_stl(input)?;
    let stats = convert_mesh(&mesh, output, options)?;
    let mut artifacts = DebugArtifacts::default();

    let dir = output.parent().unwrap_or_else(|| Path::new("."));
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let analysis_path = dir.join(format!("{}_analysis.json", stem));
    let analysis = ConversionAnalysis {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        options: *options,
        stats: stats.clone(),
        metrics: measure_mesh(&mesh),
        geometry: analytics::analyze(&mesh),
    };
    let json = serde_json::to_vec_pretty(&analysis).map_err(|e| Error::ReportWrite {
        path: analysis_path.clone(),
        source: e.into(),
    })?;
    io::write_atomic(&analysis_path, &json).map_err(|source| Error::ReportWrite {
        path: analysis_path.clone(),
        source,
    })?;
    artifacts.analysis = Some(analysis_path);

    if let Err(e) = gateway.locate() {
        warn!(error = %e, "renderer unavailable, skipping debug renders");
        return Err(e);
    }

    let preview = dir.join(format!("{}_preview.png", stem));
    gateway.render_png(output, &preview, &dir.join(format!("{}_preview.log", stem)))?;
    artifacts.preview = Some(preview);

    let echo = dir.join(format!("{}_debug.echo", stem));
    gateway.render_echo(output, &echo, &dir.join(format!("{}_debug.log", stem)))?;
    artifacts.echo = Some(echo);

    Ok((stats, artifacts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{unit_cube, Triangle};
    use tempfile::TempDir;

    #[test]
    fn test_unit_cube_conversion() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("cube.scad");
        let stats = convert_mesh(&unit_cube(), &output, &ConvertOptions::default()).unwrap();

        assert_eq!(stats.original_vertex_count, 36);
        assert_eq!(stats.deduplicated_vertex_count, 8);
        assert_eq!(stats.face_count, 12);
        assert!(stats.metadata.contains_key("volume"));

        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(text.matches("\n  [").count(), 8 + 12);
    }

    #[test]
    fn test_non_manifold_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("bad.scad");
        let fin = |tip: [f64; 3]| Triangle::from_coords([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], tip]);
        let mesh = RawMesh::new(vec![
            fin([0.0, 1.0, 0.0]),
            fin([0.0, -1.0, 0.0]),
            fin([0.0, 0.0, 1.0]),
        ]);

        let err = convert_mesh(&mesh, &output, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NonManifold { count: 1 }));
        assert!(!output.exists());
    }

    #[test]
    fn test_strategies_emit_identical_text() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.scad");
        let b = dir.path().join("b.scad");
        let mesh = crate::geometry::Primitive::sphere(3.0, 24).to_mesh();

        let linear = ConvertOptions {
            strategy: WeldStrategy::LinearScan,
            ..ConvertOptions::default()
        };
        convert_mesh(&mesh, &a, &linear).unwrap();
        convert_mesh(&mesh, &b, &ConvertOptions::default()).unwrap();
        assert_eq!(
            std::fs::read_to_string(a).unwrap(),
            std::fs::read_to_string(b).unwrap()
        );
    }

    #[test]
    fn test_debug_writes_analysis_without_renderer() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("cube.stl");
        let output = dir.path().join("cube.scad");
        let mut file = std::fs::File::create(&input).unwrap();
        let triangles: Vec<stl_io::Triangle> = unit_cube()
            .iter()
            .map(|t| stl_io::Triangle {
                normal: stl_io::Normal::new([0.0, 0.0, 0.0]),
                vertices: t
                    .vertices
                    .map(|p| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32])),
            })
            .collect();
        stl_io::write_stl(&mut file, triangles.iter()).unwrap();
        drop(file);

        let mut config = crate::openscad::RendererConfig::default();
        config.executable = Some(dir.path().join("missing-openscad"));
        let gateway = RendererGateway::new(config);

        let err = convert_with_debug(&input, &output, &ConvertOptions::default(), &gateway)
            .unwrap_err();
        assert_eq!(err.stage(), "renderer");
        assert!(output.exists());

        let analysis: ConversionAnalysis = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("cube_analysis.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(analysis.stats.deduplicated_vertex_count, 8);
        assert_eq!(analysis.geometry.triangle_count, 12);
        assert_eq!(analysis.geometry.boundary_edges, 0);
    }
}
