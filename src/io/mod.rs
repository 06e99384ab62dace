// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - STL import, polyhedron export and renderer output parsing

mod exporter;
mod importer;
pub mod parser;

pub use exporter::{
    render_polyhedron, write_atomic, write_polyhedron, DEFAULT_CONVEXITY, FACES_NAME,
    POINTS_NAME,
};
pub use importer::{load_stl, load_stl_bytes};
pub use parser::{find_scalar, find_version, parse_labeled_values, Value};
