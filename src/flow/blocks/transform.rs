// SPDX-License-Identifier: MIT

//! Transform block: reshape `input` into `output`

use super::{start, truthy, BlockOutcome};
use crate::bdk::modifier::{extract_path, value_to_text};
use crate::bdk::port::{DataKind, PortSet};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const INPUT: &str = "input";
pub const OUTPUT: &str = "output";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    #[default]
    ToString,
    ToNumber,
    ToBoolean,
    ParseJson,
    ToJsonString,
    Uppercase,
    Lowercase,
    Trim,
    Length,
    Extract,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransformConfig {
    pub transformation_type: TransformKind,
    /// Dot path for `extract`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

pub(crate) fn declare_ports(inputs: &mut PortSet, outputs: &mut PortSet) {
    inputs.register(INPUT, DataKind::Any, None);
    start::declare_trigger(inputs);
    outputs.register(OUTPUT, DataKind::Any, None);
}

impl TransformConfig {
    pub fn new(transformation_type: TransformKind) -> Self {
        Self {
            transformation_type,
            path: None,
        }
    }

    pub fn extract(path: impl Into<String>) -> Self {
        Self {
            transformation_type: TransformKind::Extract,
            path: Some(path.into()),
        }
    }

    pub(crate) fn execute(&self, inputs: &IndexMap<String, Value>) -> BlockOutcome {
        let input = inputs.get(INPUT).cloned().unwrap_or(Value::Null);
        match self.apply(&input) {
            Ok(value) => BlockOutcome::single(OUTPUT, value),
            Err(message) => {
                log::warn!("Transform {:?} failed: {}", self.transformation_type, message);
                let mut outputs = IndexMap::new();
                outputs.insert(OUTPUT.to_string(), Value::Null);
                BlockOutcome::failed(outputs, message)
            }
        }
    }

    pub fn apply(&self, value: &Value) -> Result<Value, String> {
        match self.transformation_type {
            TransformKind::ToString => Ok(Value::String(value_to_text(value))),
            TransformKind::ToNumber => to_number(value),
            TransformKind::ToBoolean => Ok(Value::Bool(truthy(value))),
            TransformKind::ParseJson => match value {
                Value::String(s) => {
                    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {}", e))
                }
                other => Ok(other.clone()),
            },
            TransformKind::ToJsonString => serde_json::to_string(value)
                .map(Value::String)
                .map_err(|e| e.to_string()),
            TransformKind::Uppercase => map_text(value, |s| s.to_uppercase()),
            TransformKind::Lowercase => map_text(value, |s| s.to_lowercase()),
            TransformKind::Trim => map_text(value, |s| s.trim().to_string()),
            TransformKind::Length => match value {
                Value::Null => Ok(Value::from(0)),
                Value::String(s) => Ok(Value::from(s.chars().count())),
                Value::Array(items) => Ok(Value::from(items.len())),
                Value::Object(map) => Ok(Value::from(map.len())),
                _ => Err("length needs a string, array or object".to_string()),
            },
            TransformKind::Extract => {
                let path = self
                    .path
                    .as_deref()
                    .ok_or_else(|| "extract needs a path".to_string())?;
                Ok(extract_path(value, path).unwrap_or(Value::Null))
            }
        }
    }
}

fn to_number(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::Bool(b) => Ok(Value::from(u8::from(*b))),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(Value::from(i));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("'{}' is not a number", s))
        }
        _ => Err("value cannot be converted to a number".to_string()),
    }
}

fn map_text<F>(value: &Value, f: F) -> Result<Value, String>
where
    F: Fn(&str) -> String,
{
    match value {
        Value::String(s) => Ok(Value::String(f(s))),
        Value::Null => Ok(Value::String(String::new())),
        _ => Err("expected a string".to_string()),
    }
}
