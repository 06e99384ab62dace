// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Edge-manifold validation over the unwelded triangle soup
//!
//! Edges are matched on exact coordinate values; the weld tolerance plays no
//! part here.

use super::RawMesh;
use crate::error::{Error, Result};
use ahash::AHashMap;
use nalgebra::Point3;
use tracing::debug;

/// Unordered pair of endpoints, stored with the smaller key first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    a: [u64; 3],
    b: [u64; 3],
}

impl EdgeKey {
    pub fn new(p: &Point3<f64>, q: &Point3<f64>) -> Self {
        let a = point_key(p);
        let b = point_key(q);
        if a <= b {
            Self { a, b }
        } else {
            Self { a: b, b: a }
        }
    }
}

// -0.0 and 0.0 must land on the same key
fn point_key(p: &Point3<f64>) -> [u64; 3] {
    [
        (p.x + 0.0).to_bits(),
        (p.y + 0.0).to_bits(),
        (p.z + 0.0).to_bits(),
    ]
}

/// Map every edge to the indices of the triangles referencing it
pub fn edge_usage(mesh: &RawMesh) -> AHashMap<EdgeKey, Vec<usize>> {
    let mut usage: AHashMap<EdgeKey, Vec<usize>> =
        AHashMap::with_capacity(mesh.triangle_count() * 3 / 2);

    for (index, triangle) in mesh.iter().enumerate() {
        for (p, q) in triangle.edges() {
            usage.entry(EdgeKey::new(&p, &q)).or_default().push(index);
        }
    }

    usage
}

/// Number of edges referenced by more than two triangles
pub fn non_manifold_edge_count(mesh: &RawMesh) -> usize {
    edge_usage(mesh)
        .values()
        .filter(|triangles| triangles.len() > 2)
        .count()
}

/// Number of edges referenced by exactly one triangle
pub fn boundary_edge_count(mesh: &RawMesh) -> usize {
    edge_usage(mesh)
        .values()
        .filter(|triangles| triangles.len() == 1)
        .count()
}

/// Reject empty meshes and meshes with any edge shared by three or more triangles
pub fn validate(mesh: &RawMesh) -> Result<()> {
    if mesh.is_empty() {
        return Err(Error::EmptyMesh);
    }

    let count = non_manifold_edge_count(mesh);
    if count > 0 {
        debug!(count, "non-manifold edges");
        return Err(Error::NonManifold { count });
    }

    Ok(())
}
