// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry analytics and statistics

use super::manifold::boundary_edge_count;
use super::{RawMesh, Triangle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Geometry statistics for a raw mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryStats {
    /// Signed volume in cubic units
    pub volume: f64,
    /// Total surface area in square units
    pub surface_area: f64,
    /// Bounding box [min_x, min_y, min_z, max_x, max_y, max_z]
    pub bbox: [f64; 6],
    /// Unwelded vertex count
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Edges used by a single triangle; zero for a closed surface
    pub boundary_edges: usize,
}

impl GeometryStats {
    pub fn empty() -> Self {
        Self {
            volume: 0.0,
            surface_area: 0.0,
            bbox: [0.0; 6],
            vertex_count: 0,
            triangle_count: 0,
            boundary_edges: 0,
        }
    }
}

/// Analyze mesh geometry and compute statistics
pub fn analyze(mesh: &RawMesh) -> GeometryStats {
    if mesh.is_empty() {
        return GeometryStats::empty();
    }

    let bbox = mesh.bounding_box();

    GeometryStats {
        volume: mesh.volume(),
        surface_area: mesh.surface_area(),
        bbox: [
            bbox.min.x, bbox.min.y, bbox.min.z, bbox.max.x, bbox.max.y, bbox.max.z,
        ],
        vertex_count: mesh.vertex_count(),
        triangle_count: mesh.triangle_count(),
        boundary_edges: boundary_edge_count(mesh),
    }
}

/// Sum of signed tetrahedra referenced from the origin.
///
/// Outward-wound closed meshes yield a positive volume; inverted winding
/// yields the negated value.
pub fn calculate_volume(triangles: &[Triangle]) -> f64 {
    triangles.iter().map(Triangle::signed_volume).sum()
}

/// Calculate total surface area
pub fn calculate_surface_area(triangles: &[Triangle]) -> f64 {
    triangles.iter().map(Triangle::area).sum()
}

/// Metadata attached to a conversion: name, analytic volume and bounding box
pub fn extract_metadata(mesh: &RawMesh) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();

    if let Some(name) = mesh.name() {
        metadata.insert("name".to_string(), name.to_string());
    }

    metadata.insert("volume".to_string(), format!("{}", mesh.volume()));
    metadata.insert(
        "surface_area".to_string(),
        format!("{}", mesh.surface_area()),
    );

    let bbox = mesh.bounding_box();
    if !bbox.is_empty() {
        metadata.insert(
            "bbox".to_string(),
            format!(
                "(({}, {}), ({}, {}), ({}, {}))",
                bbox.min.x, bbox.max.x, bbox.min.y, bbox.max.y, bbox.min.z, bbox.max.z
            ),
        );
    }

    metadata
}
