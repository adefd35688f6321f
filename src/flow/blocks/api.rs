// SPDX-License-Identifier: MIT

//! API block: one outbound HTTP call per execution
//!
//! Input ports come from a catalog schema (or the built-in "custom" shape).
//! [`ApiConfig::params`] remembers where each input ends up in the request.

use super::{start, BlockOutcome};
use crate::bdk::error::CallError;
use crate::bdk::http::{HttpClient, HttpRequest, HttpResponse};
use crate::bdk::modifier::value_to_text;
use crate::bdk::port::{DataKind, PortSet, PortSpec};
use crate::flow::catalog::{ApiSchema, SchemaInput};
use indexmap::IndexMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const RESPONSE_JSON: &str = "response_json";
pub const STATUS_CODE: &str = "status_code";
pub const ERROR: &str = "error";

/// Outputs every API block declares regardless of schema
pub const STANDARD_OUTPUTS: [(&str, DataKind); 3] = [
    (RESPONSE_JSON, DataKind::Json),
    (STATUS_CODE, DataKind::Number),
    (ERROR, DataKind::String),
];

/// Where an input port's value goes in the outbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    /// Replaces the configured URL when non-empty
    Url,
    /// Substituted into a `{name}` placeholder
    Path,
    Query,
    Body,
    Header,
    /// Whole object merged into the query string
    QueryMap,
    /// Whole object merged into the JSON body
    BodyMap,
    /// Whole object merged into the headers
    HeaderMap,
}

impl ParamLocation {
    fn port_kind(&self) -> DataKind {
        match self {
            ParamLocation::Url => DataKind::String,
            ParamLocation::QueryMap | ParamLocation::BodyMap | ParamLocation::HeaderMap => {
                DataKind::Json
            }
            _ => DataKind::Any,
        }
    }

    /// Location of a top-level schema field
    fn for_field(key: &str) -> Self {
        match key {
            "url" => ParamLocation::Url,
            "params" | "query" => ParamLocation::QueryMap,
            "body" => ParamLocation::BodyMap,
            "headers" => ParamLocation::HeaderMap,
            _ => ParamLocation::Query,
        }
    }

    /// Location of a field nested in a schema group
    fn for_group(group: &str) -> Self {
        match group {
            "path" => ParamLocation::Path,
            "body" => ParamLocation::Body,
            "headers" => ParamLocation::Header,
            _ => ParamLocation::Query,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub schema_key: String,
    pub url: String,
    pub method: String,
    pub params: IndexMap<String, ParamLocation>,
    /// Schema outputs filled from same-named top-level response fields
    pub response_fields: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let params = [
            ("url", ParamLocation::Url),
            ("params", ParamLocation::QueryMap),
            ("body", ParamLocation::BodyMap),
            ("headers", ParamLocation::HeaderMap),
        ]
        .into_iter()
        .map(|(k, loc)| (k.to_string(), loc))
        .collect();

        Self {
            schema_key: "custom".to_string(),
            url: String::new(),
            method: "GET".to_string(),
            params,
            response_fields: Vec::new(),
        }
    }
}

/// Config and port declarations derived from one catalog entry
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaPorts {
    pub config: ApiConfig,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
}

impl ApiConfig {
    /// Derive the config and ports an API block gets from a catalog schema
    pub fn from_schema(key: &str, schema: &ApiSchema) -> SchemaPorts {
        let mut params = IndexMap::new();
        let mut inputs = Vec::new();

        for (name, input) in &schema.inputs {
            match input {
                SchemaInput::Field(field) => {
                    params.insert(name.clone(), ParamLocation::for_field(name));
                    inputs.push(field.to_port(name));
                }
                SchemaInput::Group(fields) => {
                    let location = ParamLocation::for_group(name);
                    for (field_name, field) in fields {
                        params.insert(field_name.clone(), location);
                        inputs.push(field.to_port(field_name));
                    }
                }
            }
        }

        let standard: Vec<&str> = STANDARD_OUTPUTS.iter().map(|(k, _)| *k).collect();
        let mut outputs: Vec<PortSpec> = STANDARD_OUTPUTS
            .iter()
            .map(|(k, kind)| PortSpec::new(*k, *kind))
            .collect();
        let mut response_fields = Vec::new();
        for (name, field) in &schema.outputs {
            if standard.contains(&name.as_str()) {
                continue;
            }
            response_fields.push(name.clone());
            outputs.push(PortSpec::new(name.clone(), field.data_type));
        }

        let config = ApiConfig {
            schema_key: key.to_string(),
            url: schema.url.clone(),
            method: schema.method.to_uppercase(),
            params,
            response_fields,
        };

        SchemaPorts {
            config,
            inputs,
            outputs,
        }
    }

    pub(crate) fn declare_ports(&self, inputs: &mut PortSet, outputs: &mut PortSet) {
        for (key, location) in &self.params {
            inputs.register(key, location.port_kind(), None);
        }
        start::declare_trigger(inputs);
        for (key, kind) in STANDARD_OUTPUTS {
            outputs.register(key, kind, None);
        }
        for key in &self.response_fields {
            outputs.register(key, DataKind::Any, None);
        }
    }

    /// Names of the outputs that survive any schema change
    pub fn is_standard_output(key: &str) -> bool {
        STANDARD_OUTPUTS.iter().any(|(k, _)| *k == key)
    }
}

pub(crate) async fn execute(
    config: &ApiConfig,
    inputs: &IndexMap<String, Value>,
    http: &dyn HttpClient,
) -> BlockOutcome {
    let request = match build_request(config, inputs) {
        Ok(request) => request,
        Err(message) => {
            warn!("API block ({}) not sent: {}", config.schema_key, message);
            return BlockOutcome::failed(failure_outputs(config, &message), message);
        }
    };

    info!("Calling {} {}", request.method, request.url);
    match http.send(request).await {
        Ok(response) if response.is_success() => {
            BlockOutcome::ok(response_outputs(config, &response, ""))
        }
        Ok(response) => {
            let err = CallError::Status {
                status: response.status,
                body: value_to_text(&response.body),
            };
            let message = err.to_string();
            warn!("API block ({}) failed: {}", config.schema_key, message);
            BlockOutcome::failed(response_outputs(config, &response, &message), message)
        }
        Err(err) => {
            let message = err.to_string();
            warn!("API block ({}) failed: {}", config.schema_key, message);
            BlockOutcome::failed(failure_outputs(config, &message), message)
        }
    }
}

fn build_request(
    config: &ApiConfig,
    inputs: &IndexMap<String, Value>,
) -> Result<HttpRequest, String> {
    let mut url = config.url.clone();
    for (key, location) in &config.params {
        if *location != ParamLocation::Url {
            continue;
        }
        if let Some(Value::String(s)) = inputs.get(key) {
            if !s.trim().is_empty() {
                url = s.trim().to_string();
            }
        }
    }
    if url.is_empty() {
        return Err("no URL configured".to_string());
    }

    let mut query = Vec::new();
    let mut headers = Vec::new();
    let mut body = Map::new();

    for (key, location) in &config.params {
        let value = match inputs.get(key) {
            Some(value) => value,
            None => continue,
        };
        match location {
            ParamLocation::Url => {}
            ParamLocation::Path => {
                url = url.replace(&format!("{{{}}}", key), &encode_segment(&value_to_text(value)));
            }
            ParamLocation::Query if !value.is_null() => {
                query.push((key.clone(), value_to_text(value)));
            }
            ParamLocation::Header if !value.is_null() => {
                headers.push((key.clone(), value_to_text(value)));
            }
            ParamLocation::Body if !value.is_null() => {
                body.insert(key.clone(), value.clone());
            }
            ParamLocation::QueryMap => {
                for (k, v) in object_entries(key, value)? {
                    query.push((k, value_to_text(&v)));
                }
            }
            ParamLocation::HeaderMap => {
                for (k, v) in object_entries(key, value)? {
                    headers.push((k, value_to_text(&v)));
                }
            }
            ParamLocation::BodyMap => {
                body.extend(object_entries(key, value)?);
            }
            _ => {}
        }
    }

    let method = config.method.to_uppercase();
    let sends_body = !matches!(method.as_str(), "GET" | "HEAD") && !body.is_empty();

    Ok(HttpRequest {
        method,
        url,
        query,
        headers,
        body: sends_body.then_some(Value::Object(body)),
    })
}

/// Entries of an object-valued input; JSON text is parsed, null is empty
fn object_entries(key: &str, value: &Value) -> Result<Vec<(String, Value)>, String> {
    let parsed;
    let value = match value {
        Value::String(s) if s.trim().is_empty() => return Ok(Vec::new()),
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s)
                .map_err(|_| format!("input '{}' is not a JSON object", key))?;
            &parsed
        }
        other => other,
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()),
        _ => Err(format!("input '{}' is not a JSON object", key)),
    }
}

fn encode_segment(text: &str) -> String {
    url::form_urlencoded::byte_serialize(text.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn response_outputs(
    config: &ApiConfig,
    response: &HttpResponse,
    error: &str,
) -> IndexMap<String, Value> {
    let mut outputs = IndexMap::new();
    outputs.insert(RESPONSE_JSON.to_string(), response.body.clone());
    outputs.insert(STATUS_CODE.to_string(), Value::from(response.status));
    outputs.insert(ERROR.to_string(), Value::String(error.to_string()));
    for field in &config.response_fields {
        let value = response.body.get(field).cloned().unwrap_or(Value::Null);
        outputs.insert(field.clone(), value);
    }
    outputs
}

pub(crate) fn failure_outputs(config: &ApiConfig, error: &str) -> IndexMap<String, Value> {
    let mut outputs = IndexMap::new();
    outputs.insert(RESPONSE_JSON.to_string(), Value::Null);
    outputs.insert(STATUS_CODE.to_string(), Value::from(0));
    outputs.insert(ERROR.to_string(), Value::String(error.to_string()));
    for field in &config.response_fields {
        outputs.insert(field.clone(), Value::Null);
    }
    outputs
}
