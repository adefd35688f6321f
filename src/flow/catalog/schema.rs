// SPDX-License-Identifier: MIT

use crate::bdk::port::{DataKind, PortSpec};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Declared shape of one API endpoint
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ApiSchema {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,
    #[serde(default)]
    pub inputs: IndexMap<String, SchemaInput>,
    #[serde(default)]
    pub outputs: IndexMap<String, SchemaField>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// A schema input is either one field or a named group of fields
/// (`path`, `params`/`query`, `body`, `headers`).
///
/// Groups are tried first so `{}` is an empty group, not an untyped field.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SchemaInput {
    Group(IndexMap<String, SchemaField>),
    Field(SchemaField),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaField {
    #[serde(rename = "type", default)]
    pub data_type: DataKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl SchemaField {
    pub fn new(data_type: DataKind) -> Self {
        Self {
            data_type,
            default: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn to_port(&self, key: &str) -> PortSpec {
        PortSpec {
            key: key.to_string(),
            data_type: self.data_type,
            default: self.default.clone(),
        }
    }
}

fn fields(entries: &[(&str, SchemaField)]) -> IndexMap<String, SchemaField> {
    entries
        .iter()
        .map(|(k, f)| (k.to_string(), f.clone()))
        .collect()
}

/// Entries shipped with the catalog
pub(crate) static BUILTIN_SCHEMAS: Lazy<IndexMap<String, ApiSchema>> = Lazy::new(|| {
    let mut schemas = IndexMap::new();

    let custom_inputs = [
        (
            "url",
            SchemaField::new(DataKind::String).with_default(json!("https://httpbin.org/get")),
        ),
        ("params", SchemaField::new(DataKind::Json).with_default(json!({}))),
        ("body", SchemaField::new(DataKind::Json).with_default(json!({}))),
        ("headers", SchemaField::new(DataKind::Json).with_default(json!({}))),
    ];
    schemas.insert(
        "custom".to_string(),
        ApiSchema {
            name: "Custom API".to_string(),
            url: String::new(),
            method: "GET".to_string(),
            doc_url: Some("https://httpbin.org/".to_string()),
            inputs: custom_inputs
                .into_iter()
                .map(|(k, f)| (k.to_string(), SchemaInput::Field(f)))
                .collect(),
            outputs: fields(&[
                ("response_json", SchemaField::new(DataKind::Json)),
                ("status_code", SchemaField::new(DataKind::Number)),
            ]),
        },
    );

    schemas.insert(
        "cat_fact".to_string(),
        ApiSchema {
            name: "Cat Fact".to_string(),
            url: "https://catfact.ninja/fact".to_string(),
            method: "GET".to_string(),
            doc_url: Some("https://catfact.ninja/".to_string()),
            inputs: IndexMap::new(),
            outputs: fields(&[
                ("fact", SchemaField::new(DataKind::String)),
                ("length", SchemaField::new(DataKind::Number)),
            ]),
        },
    );

    let mut agify_inputs = IndexMap::new();
    agify_inputs.insert(
        "params".to_string(),
        SchemaInput::Group(fields(&[(
            "name",
            SchemaField::new(DataKind::String).with_default(json!("michael")),
        )])),
    );
    schemas.insert(
        "agify".to_string(),
        ApiSchema {
            name: "Agify.io".to_string(),
            url: "https://api.agify.io".to_string(),
            method: "GET".to_string(),
            doc_url: Some("https://agify.io/".to_string()),
            inputs: agify_inputs,
            outputs: fields(&[
                ("age", SchemaField::new(DataKind::Number)),
                ("count", SchemaField::new(DataKind::Number)),
                ("name", SchemaField::new(DataKind::String)),
            ]),
        },
    );

    let mut post_inputs = IndexMap::new();
    post_inputs.insert(
        "path".to_string(),
        SchemaInput::Group(fields(&[(
            "post_id",
            SchemaField::new(DataKind::Number).with_default(json!(1)),
        )])),
    );
    schemas.insert(
        "jsonplaceholder_get".to_string(),
        ApiSchema {
            name: "JSONPlaceholder - Get Post".to_string(),
            url: "https://jsonplaceholder.typicode.com/posts/{post_id}".to_string(),
            method: "GET".to_string(),
            doc_url: Some("https://jsonplaceholder.typicode.com/".to_string()),
            inputs: post_inputs,
            outputs: fields(&[
                ("userId", SchemaField::new(DataKind::Number)),
                ("id", SchemaField::new(DataKind::Number)),
                ("title", SchemaField::new(DataKind::String)),
                ("body", SchemaField::new(DataKind::String)),
            ]),
        },
    );

    schemas
});
