// SPDX-License-Identifier: MIT

//! Port Registry
//!
//! A [`PortSet`] holds one direction of a block's ports: the current value
//! of every port, its declared [`PortMeta`], and which ports are hidden from
//! the editor. Declaration order is preserved across every mutation.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Data-kind tag declared on a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    #[default]
    Any,
    String,
    Number,
    Boolean,
    #[serde(alias = "object")]
    Json,
    Array,
}

impl DataKind {
    /// Kind-appropriate zero value for a freshly declared port
    pub fn zero_value(&self) -> Value {
        match self {
            DataKind::Any => Value::Null,
            DataKind::String => Value::String(String::new()),
            DataKind::Number => json!(0),
            DataKind::Boolean => Value::Bool(false),
            DataKind::Json => json!({}),
            DataKind::Array => json!([]),
        }
    }
}

/// Declared metadata of a port, independent of its runtime value
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PortMeta {
    pub data_type: DataKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Externally supplied port declaration (editor or schema driven)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PortSpec {
    pub key: String,
    #[serde(default)]
    pub data_type: DataKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl PortSpec {
    pub fn new(key: impl Into<String>, data_type: DataKind) -> Self {
        Self {
            key: key.into(),
            data_type,
            default: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// One direction of a block's ports
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortSet {
    values: IndexMap<String, Value>,
    meta: IndexMap<String, PortMeta>,
    hidden: IndexSet<String>,
}

impl PortSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a port if absent. Existing ports keep their value and meta.
    ///
    /// Returns `true` when the port was added.
    pub fn register(&mut self, key: &str, data_type: DataKind, default: Option<Value>) -> bool {
        if self.values.contains_key(key) {
            return false;
        }
        let initial = default.clone().unwrap_or_else(|| data_type.zero_value());
        self.values.insert(key.to_string(), initial);
        self.meta
            .insert(key.to_string(), PortMeta { data_type, default });
        true
    }

    pub fn register_spec(&mut self, spec: &PortSpec) -> bool {
        self.register(&spec.key, spec.data_type, spec.default.clone())
    }

    /// Remove a port along with its value, meta and hidden flag
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.meta.shift_remove(key);
        self.hidden.shift_remove(key);
        self.values.shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Overwrite the value of an existing port. Returns `false` if absent.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        match self.values.get_mut(key) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn meta(&self, key: &str) -> Option<&PortMeta> {
        self.meta.get(key)
    }

    /// Flip the hidden flag. Unknown keys are ignored.
    pub fn toggle_visibility(&mut self, key: &str) {
        if !self.values.contains_key(key) {
            return;
        }
        if !self.hidden.shift_remove(key) {
            self.hidden.insert(key.to_string());
        }
    }

    pub fn hide(&mut self, key: &str) {
        if self.values.contains_key(key) {
            self.hidden.insert(key.to_string());
        }
    }

    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden.contains(key)
    }

    pub fn hidden(&self) -> impl Iterator<Item = &String> {
        self.hidden.iter()
    }

    /// Port names in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(key, meta, value)` in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PortMeta, &Value)> {
        self.values
            .iter()
            .filter_map(|(key, value)| self.meta.get(key).map(|meta| (key, meta, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_uses_default_or_zero_value() {
        let mut ports = PortSet::new();
        assert!(ports.register("title", DataKind::String, Some(json!("Form"))));
        assert!(ports.register("count", DataKind::Number, None));
        assert!(ports.register("payload", DataKind::Json, None));

        assert_eq!(ports.get("title"), Some(&json!("Form")));
        assert_eq!(ports.get("count"), Some(&json!(0)));
        assert_eq!(ports.get("payload"), Some(&json!({})));
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut ports = PortSet::new();
        ports.register("val_a", DataKind::String, None);
        ports.set("val_a", json!("Hello "));

        assert!(!ports.register("val_a", DataKind::Number, Some(json!(5))));
        assert_eq!(ports.get("val_a"), Some(&json!("Hello ")));
        assert_eq!(ports.meta("val_a").unwrap().data_type, DataKind::String);
    }

    #[test]
    fn test_order_preserved_across_removal() {
        let mut ports = PortSet::new();
        for key in ["a", "b", "c", "d"] {
            ports.register(key, DataKind::Any, None);
        }
        ports.remove("b");
        ports.register("e", DataKind::Any, None);

        let keys: Vec<&str> = ports.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "c", "d", "e"]);
    }

    #[test]
    fn test_toggle_visibility_keeps_value() {
        let mut ports = PortSet::new();
        ports.register("headers", DataKind::Json, None);
        ports.set("headers", json!({"x": "1"}));

        ports.toggle_visibility("headers");
        assert!(ports.is_hidden("headers"));
        assert_eq!(ports.get("headers"), Some(&json!({"x": "1"})));

        ports.toggle_visibility("headers");
        assert!(!ports.is_hidden("headers"));
    }

    #[test]
    fn test_toggle_unknown_key_is_noop() {
        let mut ports = PortSet::new();
        ports.toggle_visibility("ghost");
        assert_eq!(ports.hidden().count(), 0);
        assert!(!ports.contains("ghost"));
    }

    #[test]
    fn test_set_unknown_port_reports_false() {
        let mut ports = PortSet::new();
        assert!(!ports.set("missing", json!(1)));
    }

    #[test]
    fn test_data_kind_object_alias() {
        let kind: DataKind = serde_json::from_value(json!("object")).unwrap();
        assert_eq!(kind, DataKind::Json);
        let kind: DataKind = serde_json::from_value(json!("number")).unwrap();
        assert_eq!(kind, DataKind::Number);
    }
}
