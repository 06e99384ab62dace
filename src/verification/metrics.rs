// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Volume, surface area and bounding box metrics
//!
//! Source meshes are measured analytically. Emitted artifacts are measured by
//! the renderer: a wrapper script includes the artifact, evaluates the metrics
//! over `stl_points`/`stl_faces` and echoes them as labeled values.

use super::comparator::extended_float;
use crate::error::{Error, Result};
use crate::geometry::RawMesh;
use crate::io::{parse_labeled_values, Value, FACES_NAME, POINTS_NAME};
use crate::openscad::{CommandBuilder, RendererGateway, RendererInvocation};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, instrument};

pub const VOLUME_LABEL: &str = "VOLUME";
pub const AREA_LABEL: &str = "AREA";
pub const BBOX_MIN_LABEL: &str = "BBOX_MIN";
pub const BBOX_MAX_LABEL: &str = "BBOX_MAX";

/// Facet resolution set for the measurement run
const MEASURE_FN: u32 = 100;

/// Axis-aligned extent with derived dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxMetrics {
    #[serde(with = "extended_float")]
    pub min_x: f64,
    #[serde(with = "extended_float")]
    pub min_y: f64,
    #[serde(with = "extended_float")]
    pub min_z: f64,
    #[serde(with = "extended_float")]
    pub max_x: f64,
    #[serde(with = "extended_float")]
    pub max_y: f64,
    #[serde(with = "extended_float")]
    pub max_z: f64,
    #[serde(with = "extended_float")]
    pub width: f64,
    #[serde(with = "extended_float")]
    pub height: f64,
    #[serde(with = "extended_float")]
    pub depth: f64,
}

impl BoundingBoxMetrics {
    pub fn from_corners(min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            min_x: min[0],
            min_y: min[1],
            min_z: min[2],
            max_x: max[0],
            max_y: max[1],
            max_z: max[2],
            width: max[0] - min[0],
            height: max[1] - min[1],
            depth: max[2] - min[2],
        }
    }

    /// Named dimensions in report order
    pub fn dimensions(&self) -> [(&'static str, f64); 3] {
        [
            ("width", self.width),
            ("height", self.height),
            ("depth", self.depth),
        ]
    }
}

/// Metrics for one side of a comparison; `None` means "not reported"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    #[serde(default, with = "extended_float::option")]
    pub volume: Option<f64>,
    #[serde(default, with = "extended_float::option")]
    pub surface_area: Option<f64>,
    pub bounding_box: Option<BoundingBoxMetrics>,
}

impl MetricSet {
    /// Pick labeled values out of captured renderer text
    pub fn from_renderer_output(text: &str) -> Self {
        let values = parse_labeled_values(text);
        let scalar = |label: &str| values.get(label).and_then(Value::as_scalar);
        let corner = |label: &str| values.get(label).and_then(Value::as_vec3);

        let bounding_box = match (corner(BBOX_MIN_LABEL), corner(BBOX_MAX_LABEL)) {
            (Some(min), Some(max)) => Some(BoundingBoxMetrics::from_corners(min, max)),
            _ => None,
        };

        Self {
            volume: scalar(VOLUME_LABEL),
            surface_area: scalar(AREA_LABEL),
            bounding_box,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.volume.is_none() && self.surface_area.is_none() && self.bounding_box.is_none()
    }
}

/// Analytic metrics of the source mesh
pub fn measure_mesh(mesh: &RawMesh) -> MetricSet {
    let bbox = mesh.bounding_box();
    let bounding_box = (!bbox.is_empty()).then(|| {
        BoundingBoxMetrics::from_corners(
            [bbox.min.x, bbox.min.y, bbox.min.z],
            [bbox.max.x, bbox.max.y, bbox.max.z],
        )
    });

    MetricSet {
        volume: Some(mesh.volume()),
        surface_area: Some(mesh.surface_area()),
        bounding_box,
    }
}

/// Re-measures an emitted artifact
pub trait ArtifactMeasurer: Send + Sync {
    fn measure_artifact(&self, artifact: &Path) -> Result<MetricSet>;
}

impl<F> ArtifactMeasurer for F
where
    F: Fn(&Path) -> Result<MetricSet> + Send + Sync,
{
    fn measure_artifact(&self, artifact: &Path) -> Result<MetricSet> {
        self(artifact)
    }
}

/// Path as written in an `include <...>` statement.
///
/// OpenSCAD accepts forward slashes on every platform but cannot open Windows
/// verbatim (`\\?\`) paths, so that prefix is dropped.
fn include_path(artifact: &Path) -> String {
    let raw = artifact.to_string_lossy();
    let plain = if let Some(unc) = raw.strip_prefix(r"\\?\UNC\") {
        format!(r"\\{}", unc)
    } else if let Some(local) = raw.strip_prefix(r"\\?\") {
        local.to_string()
    } else {
        raw.into_owned()
    };
    plain.replace('\\', "/")
}

/// Wrapper script that includes `artifact` and echoes its metrics
pub fn metrics_script(artifact: &Path) -> String {
    let include = include_path(artifact);
    let p = POINTS_NAME;
    let f = FACES_NAME;

    format!(
        r#"include <{include}>
$fn = {fn_};

function _m_det(t) = {p}[t[0]] * cross({p}[t[1]], {p}[t[2]]) / 6;
function _m_area(t) = norm(cross({p}[t[1]] - {p}[t[0]], {p}[t[2]] - {p}[t[0]])) / 2;
function _m_volume(i = 0, acc = 0) = i >= len({f}) ? acc : _m_volume(i + 1, acc + _m_det({f}[i]));
function _m_surface(i = 0, acc = 0) = i >= len({f}) ? acc : _m_surface(i + 1, acc + _m_area({f}[i]));
function _m_axis(k) = [for (q = {p}) q[k]];

echo(str("{vol}=", _m_volume()));
echo(str("{area}=", _m_surface()));
echo(str("{bmin}=", [min(_m_axis(0)), min(_m_axis(1)), min(_m_axis(2))]));
echo(str("{bmax}=", [max(_m_axis(0)), max(_m_axis(1)), max(_m_axis(2))]));
"#,
        include = include,
        fn_ = MEASURE_FN,
        p = p,
        f = f,
        vol = VOLUME_LABEL,
        area = AREA_LABEL,
        bmin = BBOX_MIN_LABEL,
        bmax = BBOX_MAX_LABEL,
    )
}

/// Gateway-backed measurer; every run gets its own scratch directory
pub struct OpenScadMeasurer<'g> {
    gateway: &'g RendererGateway,
    timeout: Duration,
}

impl<'g> OpenScadMeasurer<'g> {
    pub fn new(gateway: &'g RendererGateway) -> Self {
        Self {
            gateway,
            timeout: gateway.timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ArtifactMeasurer for OpenScadMeasurer<'_> {
    #[instrument(skip(self), fields(artifact = %artifact.display()))]
    fn measure_artifact(&self, artifact: &Path) -> Result<MetricSet> {
        if !artifact.is_file() {
            return Err(Error::render_execution(
                "Calculate metrics",
                format!("artifact not found: {}", artifact.display()),
            ));
        }
        let artifact = std::path::absolute(artifact)
            .map_err(|e| Error::render_execution("Calculate metrics", e))?;

        let scratch = TempDir::new().map_err(|e| Error::render_execution("Calculate metrics", e))?;
        let script = scratch.path().join("metrics.scad");
        let echo = scratch.path().join("metrics.echo");
        let log = scratch.path().join("metrics.log");

        std::fs::write(&script, metrics_script(&artifact))
            .map_err(|e| Error::render_execution("Calculate metrics", e))?;

        let args = CommandBuilder::new()
            .arg("--render")
            .output(&echo)
            .input(&script)
            .build();
        let output = self.gateway.execute(&RendererInvocation::new(
            "Calculate metrics",
            args,
            &log,
            self.timeout,
        ))?;

        let mut text = std::fs::read_to_string(&echo).unwrap_or_default();
        text.push('\n');
        text.push_str(&output.log);

        let metrics = MetricSet::from_renderer_output(&text);
        debug!(?metrics, "measured artifact");
        Ok(metrics)
    }
}
