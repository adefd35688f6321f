// SPDX-License-Identifier: MIT

//! Logic block: combine operands into one `result`

use super::{start, truthy, BlockOutcome};
use crate::bdk::modifier::value_to_text;
use crate::bdk::port::{DataKind, PortSet};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub const RESULT: &str = "result";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicOperation {
    #[default]
    Add,
    #[serde(alias = "concatenate")]
    Concat,
    Subtract,
    Multiply,
    Divide,
    And,
    Or,
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogicConfig {
    pub operation: LogicOperation,
    pub operands: Vec<String>,
}

impl Default for LogicConfig {
    fn default() -> Self {
        Self {
            operation: LogicOperation::Add,
            operands: vec!["val_a".to_string(), "val_b".to_string()],
        }
    }
}

impl LogicConfig {
    pub fn new(operation: LogicOperation) -> Self {
        Self {
            operation,
            ..Self::default()
        }
    }

    pub(crate) fn declare_ports(&self, inputs: &mut PortSet, outputs: &mut PortSet) {
        for key in &self.operands {
            inputs.register(key, DataKind::Any, None);
        }
        start::declare_trigger(inputs);
        outputs.register(RESULT, DataKind::Any, None);
    }

    pub(crate) fn execute(&self, inputs: &IndexMap<String, Value>) -> BlockOutcome {
        let operands: Vec<&Value> = self
            .operands
            .iter()
            .filter_map(|key| inputs.get(key))
            .filter(|value| !value.is_null())
            .collect();

        match evaluate(self.operation, &operands) {
            Ok(result) => BlockOutcome::single(RESULT, result),
            Err(message) => {
                log::warn!("Logic {:?} failed: {}", self.operation, message);
                let mut outputs = IndexMap::new();
                outputs.insert(RESULT.to_string(), Value::Null);
                BlockOutcome::failed(outputs, message)
            }
        }
    }
}

/// Apply an operation to non-null operands. No operands yields null.
pub fn evaluate(operation: LogicOperation, operands: &[&Value]) -> Result<Value, String> {
    if operands.is_empty() {
        return Ok(Value::Null);
    }

    match operation {
        LogicOperation::Add => add(operands),
        LogicOperation::Concat => Ok(Value::String(
            operands.iter().map(|v| value_to_text(v)).collect(),
        )),
        LogicOperation::Subtract => fold_numbers(operands, |a, b| Ok(a - b)),
        LogicOperation::Multiply => fold_numbers(operands, |a, b| Ok(a * b)),
        LogicOperation::Divide => fold_numbers(operands, |a, b| {
            if b == 0.0 {
                Err("division by zero".to_string())
            } else {
                Ok(a / b)
            }
        }),
        LogicOperation::And => Ok(Value::Bool(operands.iter().all(|v| truthy(v)))),
        LogicOperation::Or => Ok(Value::Bool(operands.iter().any(|v| truthy(v)))),
        LogicOperation::Equals => Ok(Value::Bool(all_equal(operands))),
        LogicOperation::NotEquals => Ok(Value::Bool(!all_equal(operands))),
        LogicOperation::GreaterThan => chain(operands, Ordering::Greater),
        LogicOperation::LessThan => chain(operands, Ordering::Less),
        LogicOperation::Min => extreme(operands, Ordering::Less),
        LogicOperation::Max => extreme(operands, Ordering::Greater),
    }
}

fn add(operands: &[&Value]) -> Result<Value, String> {
    let first = operands[0];
    match first {
        Value::Number(_) => fold_numbers(operands, |a, b| Ok(a + b)),
        Value::String(_) => {
            let mut out = String::new();
            for value in operands {
                match value {
                    Value::String(s) => out.push_str(s),
                    other => return Err(mismatch("string", other)),
                }
            }
            Ok(Value::String(out))
        }
        Value::Array(_) => {
            let mut out = Vec::new();
            for value in operands {
                match value {
                    Value::Array(items) => out.extend(items.iter().cloned()),
                    other => return Err(mismatch("array", other)),
                }
            }
            Ok(Value::Array(out))
        }
        Value::Object(_) => {
            let mut out = Map::new();
            for value in operands {
                match value {
                    Value::Object(map) => {
                        out.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())))
                    }
                    other => return Err(mismatch("object", other)),
                }
            }
            Ok(Value::Object(out))
        }
        other => Err(format!("cannot add {}", kind_name(other))),
    }
}

fn fold_numbers<F>(operands: &[&Value], op: F) -> Result<Value, String>
where
    F: Fn(f64, f64) -> Result<f64, String>,
{
    let mut numbers = operands.iter().map(|v| as_number(v));
    let mut acc = match numbers.next() {
        Some(n) => n?,
        None => return Ok(Value::Null),
    };
    for n in numbers {
        acc = op(acc, n?)?;
    }
    Ok(number_value(acc))
}

fn as_number(value: &Value) -> Result<f64, String> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| "number out of range".to_string()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number", s)),
        other => Err(mismatch("number", other)),
    }
}

/// Integral results stay integers
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn all_equal(operands: &[&Value]) -> bool {
    operands.windows(2).all(|pair| loosely_equal(pair[0], pair[1]))
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, String> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => {
            let (x, y) = (as_number(a)?, as_number(b)?);
            x.partial_cmp(&y)
                .ok_or_else(|| "values are not comparable".to_string())
        }
    }
}

fn chain(operands: &[&Value], wanted: Ordering) -> Result<Value, String> {
    for pair in operands.windows(2) {
        if compare(pair[0], pair[1])? != wanted {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn extreme(operands: &[&Value], wanted: Ordering) -> Result<Value, String> {
    let mut best = operands[0];
    for value in &operands[1..] {
        if compare(value, best)? == wanted {
            best = *value;
        }
    }
    Ok(best.clone())
}

fn mismatch(expected: &str, got: &Value) -> String {
    format!("expected {}, got {}", expected, kind_name(got))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
