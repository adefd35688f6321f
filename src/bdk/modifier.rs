// SPDX-License-Identifier: MIT

//! Named value modifiers applied when a value crosses a connector

use crate::bdk::error::GraphError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type ModifierFn = dyn Fn(Value) -> Value + Send + Sync;

/// A pure `Value -> Value` function identified by name.
///
/// The name is what graph snapshots store; the function itself is resolved
/// again through a [`ModifierRegistry`] on restore.
#[derive(Clone)]
pub struct Modifier {
    name: String,
    func: Arc<ModifierFn>,
}

impl Modifier {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, value: Value) -> Value {
        (self.func)(value)
    }

    /// `{"<key>": value}`
    pub fn wrap(key: &str) -> Self {
        let field = key.to_string();
        Self::new(format!("wrap:{}", key), move |value| {
            let mut obj = Map::new();
            obj.insert(field.clone(), value);
            Value::Object(obj)
        })
    }

    /// Nested field lookup with a dot path; null when missing
    pub fn get(path: &str) -> Self {
        let path_owned = path.to_string();
        Self::new(format!("get:{}", path), move |value| {
            extract_path(&value, &path_owned).unwrap_or(Value::Null)
        })
    }
}

impl fmt::Debug for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modifier").field("name", &self.name).finish()
    }
}

impl PartialEq for Modifier {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Extract a value from JSON using a simple dot-notation path
pub fn extract_path(json: &Value, path: &str) -> Option<Value> {
    let mut current = json;
    for part in path.split('.').filter(|p| !p.is_empty()) {
        current = match current {
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            other => other.get(part)?,
        };
    }
    Some(current.clone())
}

/// Render a value as plain text: strings raw, null empty, the rest as JSON
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Resolves modifier names found in snapshots
#[derive(Clone)]
pub struct ModifierRegistry {
    named: HashMap<String, Modifier>,
}

impl ModifierRegistry {
    /// Registry preloaded with the built-in modifiers
    pub fn new() -> Self {
        let mut registry = Self {
            named: HashMap::new(),
        };
        registry.register(Modifier::new("identity", |v| v));
        registry.register(Modifier::new("to_string", |v| Value::String(value_to_text(&v))));
        registry.register(Modifier::new("to_number", |v| match &v {
            Value::Number(_) => v,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Value::Bool(b) => Value::from(u8::from(*b)),
            _ => Value::Null,
        }));
        registry.register(Modifier::new("parse_json", |v| match &v {
            Value::String(s) => serde_json::from_str(s).unwrap_or(v),
            _ => v,
        }));
        registry
    }

    pub fn register(&mut self, modifier: Modifier) {
        self.named.insert(modifier.name().to_string(), modifier);
    }

    /// Look up a modifier by name; `wrap:` and `get:` are parameterized.
    pub fn resolve(&self, name: &str) -> Result<Modifier, GraphError> {
        if let Some(modifier) = self.named.get(name) {
            return Ok(modifier.clone());
        }
        if let Some(key) = name.strip_prefix("wrap:") {
            return Ok(Modifier::wrap(key));
        }
        if let Some(path) = name.strip_prefix("get:") {
            return Ok(Modifier::get(path));
        }
        Err(GraphError::UnknownModifier(name.to_string()))
    }
}

impl Default for ModifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrap_modifier() {
        let modifier = Modifier::wrap("message");
        assert_eq!(modifier.name(), "wrap:message");
        assert_eq!(
            modifier.apply(json!("Hello World")),
            json!({"message": "Hello World"})
        );
    }

    #[test]
    fn test_get_modifier() {
        let modifier = Modifier::get("data.items.1");
        let input = json!({"data": {"items": ["a", "b"]}});
        assert_eq!(modifier.apply(input), json!("b"));
        assert_eq!(modifier.apply(json!({})), Value::Null);
    }

    #[test]
    fn test_registry_resolves_builtins_and_parameterized() {
        let registry = ModifierRegistry::new();
        assert_eq!(registry.resolve("identity").unwrap().apply(json!(3)), json!(3));
        assert_eq!(
            registry.resolve("to_string").unwrap().apply(json!(42)),
            json!("42")
        );
        assert_eq!(
            registry.resolve("to_number").unwrap().apply(json!(" 2.5 ")),
            json!(2.5)
        );
        assert_eq!(
            registry.resolve("parse_json").unwrap().apply(json!("{\"a\":1}")),
            json!({"a": 1})
        );
        assert_eq!(
            registry.resolve("wrap:x").unwrap().apply(json!(1)),
            json!({"x": 1})
        );
    }

    #[test]
    fn test_registry_unknown_name() {
        let registry = ModifierRegistry::new();
        assert_eq!(
            registry.resolve("shout").unwrap_err(),
            GraphError::UnknownModifier("shout".to_string())
        );
    }

    #[test]
    fn test_register_custom_modifier() {
        let mut registry = ModifierRegistry::new();
        registry.register(Modifier::new("double", |v| {
            json!(v.as_f64().unwrap_or(0.0) * 2.0)
        }));
        assert_eq!(registry.resolve("double").unwrap().apply(json!(4)), json!(8.0));
    }

    #[test]
    fn test_extract_path() {
        let json = json!({"result": {"data": {"value": 42}}});
        assert_eq!(
            extract_path(&json, "result.data"),
            Some(json!({"value": 42}))
        );
        assert_eq!(extract_path(&json, "result.data.value"), Some(json!(42)));
        assert_eq!(extract_path(&json, "nonexistent"), None);
        assert_eq!(extract_path(&json, ""), Some(json.clone()));
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!("plain")), "plain");
        assert_eq!(value_to_text(&Value::Null), "");
        assert_eq!(value_to_text(&json!({"a": 1})), "{\"a\":1}");
        assert_eq!(value_to_text(&json!(true)), "true");
    }
}
