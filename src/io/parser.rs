// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Renderer output parser using pest
//!
//! Pulls `LABEL=value` / `LABEL: value` pairs and version tokens out of
//! captured renderer text. Unrecognised text is skipped, never an error.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Parser)]
#[grammar = "io/renderer_output.pest"]
struct RendererOutputParser;

/// A labeled scalar or vector value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Vector(_) => None,
        }
    }

    /// Three-component vector, e.g. a bounding box corner
    pub fn as_vec3(&self) -> Option<[f64; 3]> {
        match self {
            Value::Vector(v) if v.len() == 3 => Some([v[0], v[1], v[2]]),
            _ => None,
        }
    }
}

/// All labeled values in `text`; the first occurrence of a label wins
pub fn parse_labeled_values(text: &str) -> BTreeMap<String, Value> {
    let mut values = BTreeMap::new();

    let output = match RendererOutputParser::parse(Rule::output, text) {
        Ok(mut pairs) => match pairs.next() {
            Some(pair) => pair,
            None => return values,
        },
        Err(e) => {
            trace!(error = %e, "renderer output not parsed");
            return values;
        }
    };

    for pair in output.into_inner() {
        if pair.as_rule() != Rule::labeled {
            continue;
        }
        if let Some((label, value)) = parse_labeled(pair) {
            values.entry(label).or_insert(value);
        }
    }

    values
}

fn parse_labeled(pair: Pair<Rule>) -> Option<(String, Value)> {
    let mut inner = pair.into_inner();
    let label = inner.next()?.as_str().to_string();
    let value = inner.next()?;

    let value = match value.as_rule() {
        Rule::number => Value::Scalar(parse_number(value.as_str())?),
        Rule::vector => Value::Vector(
            value
                .into_inner()
                .map(|n| parse_number(n.as_str()))
                .collect::<Option<Vec<_>>>()?,
        ),
        _ => return None,
    };

    Some((label, value))
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok()
}

/// Scalar under `label`, if present and numeric
pub fn find_scalar(text: &str, label: &str) -> Option<f64> {
    parse_labeled_values(text)
        .get(label)
        .and_then(Value::as_scalar)
}

/// First date-stamped version token (`YYYY.MM.DD`, or `YYYY.MM` for old releases)
pub fn find_version(text: &str) -> Option<String> {
    let scan = RendererOutputParser::parse(Rule::version_scan, text)
        .ok()?
        .next()?;

    scan.into_inner()
        .find(|p| p.as_rule() == Rule::version)
        .map(|p| p.as_str().to_string())
}
