// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Tolerance-based vertex welding and face re-indexing
//!
//! Points are visited in input order. Each point maps to the first existing
//! representative it is close to, or becomes a new representative. The
//! result depends on input order, and a point close to several
//! representatives always joins the one with the lowest index. Both
//! strategies below produce identical output.

use crate::error::{Error, Result};
use ahash::AHashMap;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Absolute floor added to the relative test so points at the origin can weld
pub const ABS_TOLERANCE: f64 = 1e-8;

/// Default relative weld tolerance
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// How candidate representatives are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeldStrategy {
    /// Compare against every representative, O(n²)
    LinearScan,
    /// Uniform grid over representatives, 27 cells per lookup
    #[default]
    SpatialHash,
}

/// Unique points plus one representative index per input point
#[derive(Debug, Clone, PartialEq)]
pub struct WeldResult {
    pub points: Vec<Point3<f64>>,
    pub index_map: Vec<usize>,
}

impl WeldResult {
    pub fn merged_count(&self) -> usize {
        self.index_map.len() - self.points.len()
    }
}

/// Compact vertex array and one face per original triangle
#[derive(Debug, Clone, PartialEq)]
pub struct WeldedGeometry {
    pub points: Vec<Point3<f64>>,
    pub faces: Vec<[usize; 3]>,
}

impl WeldedGeometry {
    /// Weld the flattened triangle points, build faces and drop unreferenced points
    pub fn from_points(
        points: &[Point3<f64>],
        tolerance: f64,
        strategy: WeldStrategy,
    ) -> Result<Self> {
        let welded = weld(points, tolerance, strategy)?;
        let faces = build_faces(&welded.index_map);
        let (points, faces) = optimize(welded.points, faces);
        Ok(Self { points, faces })
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Every face index addresses an existing point
    pub fn indices_in_bounds(&self) -> bool {
        let n = self.points.len();
        self.faces.iter().flatten().all(|&i| i < n)
    }
}

/// Component-wise relative closeness with an absolute floor
pub fn is_close(a: &Point3<f64>, b: &Point3<f64>, tolerance: f64) -> bool {
    (0..3).all(|i| {
        let (x, y) = (a[i], b[i]);
        (x - y).abs() <= ABS_TOLERANCE + tolerance * x.abs().max(y.abs())
    })
}

fn check_tolerance(tolerance: f64) -> Result<()> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(Error::InvalidTolerance {
            name: "weld",
            value: tolerance,
        });
    }
    Ok(())
}

/// Fold near-duplicate points into representatives
#[instrument(skip(points), fields(points = points.len()))]
pub fn weld(points: &[Point3<f64>], tolerance: f64, strategy: WeldStrategy) -> Result<WeldResult> {
    check_tolerance(tolerance)?;

    let result = match strategy {
        WeldStrategy::LinearScan => weld_linear(points, tolerance),
        WeldStrategy::SpatialHash => weld_spatial(points, tolerance),
    };

    debug!(
        unique = result.points.len(),
        merged = result.merged_count(),
        "welded points"
    );
    Ok(result)
}

fn weld_linear(points: &[Point3<f64>], tolerance: f64) -> WeldResult {
    let mut unique: Vec<Point3<f64>> = Vec::new();
    let mut index_map = Vec::with_capacity(points.len());

    for point in points {
        match unique.iter().position(|u| is_close(point, u, tolerance)) {
            Some(index) => index_map.push(index),
            None => {
                index_map.push(unique.len());
                unique.push(*point);
            }
        }
    }

    WeldResult {
        points: unique,
        index_map,
    }
}

type Cell = (i64, i64, i64);

fn pos_to_cell(pos: &Point3<f64>, cell_size: f64) -> Cell {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}

fn max_abs_coordinate(points: &[Point3<f64>]) -> f64 {
    points
        .iter()
        .flat_map(|p| p.coords.iter())
        .filter(|c| c.is_finite())
        .fold(0.0_f64, |m, c| m.max(c.abs()))
}

fn weld_spatial(points: &[Point3<f64>], tolerance: f64) -> WeldResult {
    // Close points differ by at most `reach` per component, so with cells of
    // twice that size they sit in the same or an adjacent cell even after
    // rounding in the division.
    let reach = ABS_TOLERANCE + tolerance * max_abs_coordinate(points);
    let cell_size = 2.0 * reach;

    let mut grid: AHashMap<Cell, Vec<usize>> = AHashMap::new();
    let mut unique: Vec<Point3<f64>> = Vec::new();
    let mut index_map = Vec::with_capacity(points.len());

    for point in points {
        let cell = pos_to_cell(point, cell_size);
        let mut found: Option<usize> = None;

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor = (
                        cell.0.saturating_add(dx),
                        cell.1.saturating_add(dy),
                        cell.2.saturating_add(dz),
                    );
                    let Some(candidates) = grid.get(&neighbor) else {
                        continue;
                    };
                    // Candidates are ascending, the first hit is the cell's lowest
                    if let Some(&index) = candidates
                        .iter()
                        .find(|&&i| is_close(point, &unique[i], tolerance))
                    {
                        found = Some(found.map_or(index, |f| f.min(index)));
                    }
                }
            }
        }

        match found {
            Some(index) => index_map.push(index),
            None => {
                let index = unique.len();
                grid.entry(cell).or_default().push(index);
                unique.push(*point);
                index_map.push(index);
            }
        }
    }

    WeldResult {
        points: unique,
        index_map,
    }
}

/// Group the index map three at a time, preserving triangle order and winding
pub fn build_faces(index_map: &[usize]) -> Vec<[usize; 3]> {
    index_map
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect()
}

/// Drop points no face references and renumber faces to match
pub fn optimize(points: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> (Vec<Point3<f64>>, Vec<[usize; 3]>) {
    let referenced: BTreeSet<usize> = faces.iter().flatten().copied().collect();
    if referenced.len() == points.len() {
        return (points, faces);
    }

    let mut remap = vec![usize::MAX; points.len()];
    let mut kept = Vec::with_capacity(referenced.len());
    for &old in &referenced {
        if let Some(point) = points.get(old) {
            remap[old] = kept.len();
            kept.push(*point);
        }
    }

    let faces = faces
        .into_iter()
        .map(|face| face.map(|i| remap.get(i).copied().unwrap_or(usize::MAX)))
        .collect();

    debug!(removed = points.len() - kept.len(), "removed unreferenced points");
    (kept, faces)
}
