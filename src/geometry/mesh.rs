// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle soup as ingested from an STL source

use super::analytics;
use super::BoundingBox;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Three ordered corner points; no storage is shared with neighbouring triangles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub vertices: [Point3<f64>; 3],
}

impl Triangle {
    pub fn new(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    pub fn from_coords(coords: [[f64; 3]; 3]) -> Self {
        let [a, b, c] = coords;
        Self::new(
            Point3::new(a[0], a[1], a[2]),
            Point3::new(b[0], b[1], b[2]),
            Point3::new(c[0], c[1], c[2]),
        )
    }

    /// The three directed edges `(v0, v1)`, `(v1, v2)`, `(v2, v0)`
    pub fn edges(&self) -> [(Point3<f64>, Point3<f64>); 3] {
        let [a, b, c] = self.vertices;
        [(a, b), (b, c), (c, a)]
    }

    /// Area via half the cross product magnitude
    pub fn area(&self) -> f64 {
        let [a, b, c] = self.vertices;
        0.5 * (b - a).cross(&(c - a)).norm()
    }

    /// Signed volume of the tetrahedron spanned with the origin
    pub fn signed_volume(&self) -> f64 {
        let [a, b, c] = self.vertices;
        a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
    }
}

/// Immutable triangle list with lazily derived mass properties
#[derive(Debug, Clone)]
pub struct RawMesh {
    name: Option<String>,
    triangles: Vec<Triangle>,
    bbox: OnceLock<BoundingBox>,
    volume: OnceLock<f64>,
    surface_area: OnceLock<f64>,
}

impl RawMesh {
    pub fn new(triangles: Vec<Triangle>) -> Self {
        Self {
            name: None,
            triangles,
            bbox: OnceLock::new(),
            volume: OnceLock::new(),
            surface_area: OnceLock::new(),
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name.filter(|n| !n.is_empty());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Triangle> {
        self.triangles.iter()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Unwelded vertex count, three per triangle
    pub fn vertex_count(&self) -> usize {
        self.triangles.len() * 3
    }

    /// Flattened corner points in triangle order
    pub fn points(&self) -> Vec<Point3<f64>> {
        self.triangles
            .iter()
            .flat_map(|t| t.vertices.iter().copied())
            .collect()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        *self
            .bbox
            .get_or_init(|| BoundingBox::from_points(self.triangles.iter().flat_map(|t| t.vertices.iter())))
    }

    pub fn volume(&self) -> f64 {
        *self
            .volume
            .get_or_init(|| analytics::calculate_volume(&self.triangles))
    }

    pub fn surface_area(&self) -> f64 {
        *self
            .surface_area
            .get_or_init(|| analytics::calculate_surface_area(&self.triangles))
    }

    /// Informational key/value pairs written as comments into the artifact
    pub fn metadata(&self) -> BTreeMap<String, String> {
        analytics::extract_metadata(self)
    }
}

impl<'a> IntoIterator for &'a RawMesh {
    type Item = &'a Triangle;
    type IntoIter = std::slice::Iter<'a, Triangle>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
