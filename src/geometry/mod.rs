// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - triangle soup, validation and welding

pub mod analytics;
pub mod manifold;
pub mod weld;
mod bbox;
mod mesh;
mod primitives;

pub use analytics::GeometryStats;
pub use bbox::BoundingBox;
pub use mesh::{RawMesh, Triangle};
pub use primitives::{unit_cube, Primitive};
pub use weld::{WeldResult, WeldStrategy, WeldedGeometry};
