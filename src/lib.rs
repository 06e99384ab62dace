// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! stl2scad
//!
//! Converts STL triangle meshes into OpenSCAD `polyhedron()` artifacts and
//! verifies the conversion by re-measuring the emitted solid with OpenSCAD.

pub mod cli;
pub mod convert;
pub mod error;
pub mod geometry;
pub mod io;
pub mod openscad;
pub mod verification;

pub use convert::{convert, convert_mesh, convert_with_debug, ConversionStats, ConvertOptions};
pub use error::{Error, Result};
pub use geometry::{RawMesh, WeldStrategy, WeldedGeometry};
pub use io::load_stl;
pub use openscad::{RendererConfig, RendererGateway};
pub use verification::{
    batch_verify, verify, verify_conversion, BatchOptions, MetricSet, OpenScadMeasurer, Tolerance,
    VerificationResult,
};
