// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Metric comparison and tolerances

use super::metrics::MetricSet;
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Allowed absolute percent difference per metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub volume_pct: f64,
    pub surface_area_pct: f64,
    pub bbox_dimension_pct: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            volume_pct: 1.0,
            surface_area_pct: 2.0,
            bbox_dimension_pct: 0.5,
        }
    }
}

impl Tolerance {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("volume", self.volume_pct),
            ("surface_area", self.surface_area_pct),
            ("bounding_box", self.bbox_dimension_pct),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidTolerance { name, value });
            }
        }
        Ok(())
    }
}

/// `(target - source) / source * 100`; zero when both are zero, signed infinity
/// when only the source is
pub fn percent_difference(source: f64, target: f64) -> f64 {
    let diff = target - source;
    if source == 0.0 {
        if diff == 0.0 {
            0.0
        } else if diff > 0.0 {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        }
    } else {
        diff / source * 100.0
    }
}

/// One metric measured on both sides
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(with = "extended_float")]
    pub source: f64,
    #[serde(with = "extended_float")]
    pub target: f64,
    #[serde(with = "extended_float")]
    pub absolute_difference: f64,
    #[serde(with = "extended_float")]
    pub percent_difference: f64,
}

impl Comparison {
    pub fn new(source: f64, target: f64) -> Self {
        Self {
            source,
            target,
            absolute_difference: (target - source).abs(),
            percent_difference: percent_difference(source, target),
        }
    }

    /// Outside tolerance; an undefined (NaN) difference counts as outside
    pub fn exceeds(&self, tolerance_pct: f64) -> bool {
        self.percent_difference.is_nan() || self.percent_difference.abs() > tolerance_pct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxComparison {
    pub width: Comparison,
    pub height: Comparison,
    pub depth: Comparison,
}

impl BoundingBoxComparison {
    pub fn dimensions(&self) -> [(&'static str, &Comparison); 3] {
        [
            ("width", &self.width),
            ("height", &self.height),
            ("depth", &self.depth),
        ]
    }
}

/// Comparisons for every metric present on both sides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub volume: Option<Comparison>,
    pub surface_area: Option<Comparison>,
    pub bounding_box: Option<BoundingBoxComparison>,
}

/// Compare source and target; metrics missing on either side are skipped
pub fn compare_metrics(source: &MetricSet, target: &MetricSet) -> MetricComparison {
    let pair = |s: Option<f64>, t: Option<f64>| Some(Comparison::new(s?, t?));

    let bounding_box = match (&source.bounding_box, &target.bounding_box) {
        (Some(s), Some(t)) => Some(BoundingBoxComparison {
            width: Comparison::new(s.width, t.width),
            height: Comparison::new(s.height, t.height),
            depth: Comparison::new(s.depth, t.depth),
        }),
        _ => None,
    };

    MetricComparison {
        volume: pair(source.volume, target.volume),
        surface_area: pair(source.surface_area, target.surface_area),
        bounding_box,
    }
}

/// f64 that keeps infinities and NaN readable in JSON as `"inf"`, `"-inf"`, `"nan"`
pub mod extended_float {
    use super::*;

    pub fn serialize<S>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    fn from_repr<E: serde::de::Error>(repr: Repr) -> std::result::Result<f64, E> {
        match repr {
            Repr::Number(v) => Ok(v),
            Repr::Text(text) => match text.as_str() {
                "inf" | "+inf" | "Infinity" => Ok(f64::INFINITY),
                "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
                "nan" | "NaN" => Ok(f64::NAN),
                other => Err(E::custom(format!("invalid number: {}", other))),
            },
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        from_repr(Repr::deserialize(deserializer)?)
    }

    /// `Option<f64>` form; `None` stays `null`. Pair with `#[serde(default)]`.
    pub mod option {
        use super::*;

        pub fn serialize<S>(
            value: &Option<f64>,
            serializer: S,
        ) -> std::result::Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(
            deserializer: D,
        ) -> std::result::Result<Option<f64>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<Repr>::deserialize(deserializer)?
                .map(from_repr)
                .transpose()
        }
    }
}
