// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Console presentation for the stl2scad binary

pub mod reporter;

pub use reporter::Reporter;
