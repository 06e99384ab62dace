// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle-soup primitives used by tests, benches and debug fixtures

use super::{RawMesh, Triangle};
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Closed, outward-wound primitives
pub enum Primitive {
    Cube { size: Vector3<f64>, center: bool },
    Sphere { r: f64, segments: u32 },
}

impl Primitive {
    pub fn cube(size: Vector3<f64>, center: bool) -> Self {
        Self::Cube { size, center }
    }

    pub fn sphere(r: f64, segments: u32) -> Self {
        let segments = if segments >= 3 { segments } else { 32 };
        Self::Sphere { r, segments }
    }

    pub fn to_mesh(&self) -> RawMesh {
        match self {
            Self::Cube { size, center } => generate_cube_mesh(*size, *center),
            Self::Sphere { r, segments } => generate_sphere_mesh(*r, *segments),
        }
    }
}

/// Axis-aligned unit cube at the origin: 8 corners, 12 triangles
pub fn unit_cube() -> RawMesh {
    Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh()
}

fn generate_cube_mesh(size: Vector3<f64>, center: bool) -> RawMesh {
    let offset = if center { -size / 2.0 } else { Vector3::zeros() };
    let corner = |x: f64, y: f64, z: f64| {
        Point3::new(x * size.x, y * size.y, z * size.z) + offset
    };

    let p = [
        corner(0.0, 0.0, 0.0),
        corner(1.0, 0.0, 0.0),
        corner(1.0, 1.0, 0.0),
        corner(0.0, 1.0, 0.0),
        corner(0.0, 0.0, 1.0),
        corner(1.0, 0.0, 1.0),
        corner(1.0, 1.0, 1.0),
        corner(0.0, 1.0, 1.0),
    ];

    // Counter-clockwise seen from outside
    let faces: [[usize; 3]; 12] = [
        [0, 3, 2],
        [0, 2, 1],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [2, 3, 7],
        [2, 7, 6],
        [1, 2, 6],
        [1, 6, 5],
        [3, 0, 4],
        [3, 4, 7],
    ];

    RawMesh::new(
        faces
            .iter()
            .map(|f| Triangle::new(p[f[0]], p[f[1]], p[f[2]]))
            .collect(),
    )
}

fn generate_sphere_mesh(r: f64, segments: u32) -> RawMesh {
    let rings = (segments / 2).max(2);
    let point = |ring: u32, seg: u32| {
        let theta = PI * ring as f64 / rings as f64;
        let phi = 2.0 * PI * (seg % segments) as f64 / segments as f64;
        Point3::new(
            r * theta.sin() * phi.cos(),
            r * theta.sin() * phi.sin(),
            r * theta.cos(),
        )
    };
    let north = Point3::new(0.0, 0.0, r);
    let south = Point3::new(0.0, 0.0, -r);

    let mut triangles = Vec::new();
    for seg in 0..segments {
        triangles.push(Triangle::new(north, point(1, seg), point(1, seg + 1)));
        for ring in 1..rings - 1 {
            let a = point(ring, seg);
            let b = point(ring + 1, seg);
            let c = point(ring + 1, seg + 1);
            let d = point(ring, seg + 1);
            triangles.push(Triangle::new(a, b, c));
            triangles.push(Triangle::new(a, c, d));
        }
        triangles.push(Triangle::new(
            south,
            point(rings - 1, seg + 1),
            point(rings - 1, seg),
        ));
    }

    RawMesh::new(triangles)
}
