// SPDX-License-Identifier: MIT

//! Block variants
//!
//! Every block is one [`Block`] struct carrying a closed [`BlockKind`] enum.
//! The kind decides which ports a block declares at construction and what
//! `execute` does; everything else (ports, connectors, snapshots) is shared.

pub mod api;
mod block;
pub mod interactive;
pub mod logic;
pub mod start;
pub mod string_builder;
pub mod transform;

pub use api::{ApiConfig, ParamLocation};
pub use block::{Block, DetachedConnectors};
pub use interactive::InteractiveConfig;
pub use logic::{LogicConfig, LogicOperation};
pub use string_builder::StringBuilderConfig;
pub use transform::{TransformConfig, TransformKind};

use crate::bdk::http::HttpClient;
use crate::bdk::port::PortSet;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Variant tag of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Start,
    Api,
    Logic,
    Transform,
    StringBuilder,
    #[serde(alias = "REACT")]
    InteractiveUi,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            BlockType::Start => "START",
            BlockType::Api => "API",
            BlockType::Logic => "LOGIC",
            BlockType::Transform => "TRANSFORM",
            BlockType::StringBuilder => "STRING_BUILDER",
            BlockType::InteractiveUi => "INTERACTIVE_UI",
        };
        write!(f, "{}", tag)
    }
}

/// Variant plus its variant-specific configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockKind {
    Start,
    Api(ApiConfig),
    Logic(LogicConfig),
    Transform(TransformConfig),
    StringBuilder(StringBuilderConfig),
    #[serde(alias = "REACT")]
    InteractiveUi(InteractiveConfig),
}

impl BlockKind {
    pub fn block_type(&self) -> BlockType {
        match self {
            BlockKind::Start => BlockType::Start,
            BlockKind::Api(_) => BlockType::Api,
            BlockKind::Logic(_) => BlockType::Logic,
            BlockKind::Transform(_) => BlockType::Transform,
            BlockKind::StringBuilder(_) => BlockType::StringBuilder,
            BlockKind::InteractiveUi(_) => BlockType::InteractiveUi,
        }
    }

    /// Default configuration for a variant tag
    pub fn from_type(block_type: BlockType) -> Self {
        match block_type {
            BlockType::Start => BlockKind::Start,
            BlockType::Api => BlockKind::Api(ApiConfig::default()),
            BlockType::Logic => BlockKind::Logic(LogicConfig::default()),
            BlockType::Transform => BlockKind::Transform(TransformConfig::default()),
            BlockType::StringBuilder => BlockKind::StringBuilder(StringBuilderConfig::default()),
            BlockType::InteractiveUi => BlockKind::InteractiveUi(InteractiveConfig::default()),
        }
    }

    /// Whether ports may be added/removed after construction
    pub fn ports_editable(&self) -> bool {
        matches!(self, BlockKind::Api(_) | BlockKind::InteractiveUi(_))
    }

    /// Register the ports this variant declares
    pub(crate) fn declare_ports(&self, inputs: &mut PortSet, outputs: &mut PortSet) {
        match self {
            BlockKind::Start => start::declare_ports(outputs),
            BlockKind::Api(config) => config.declare_ports(inputs, outputs),
            BlockKind::Logic(config) => config.declare_ports(inputs, outputs),
            BlockKind::Transform(_) => transform::declare_ports(inputs, outputs),
            BlockKind::StringBuilder(config) => config.declare_ports(inputs, outputs),
            BlockKind::InteractiveUi(_) => interactive::declare_ports(inputs, outputs),
        }
    }

    /// Run the variant's logic over a snapshot of the block's inputs.
    ///
    /// Domain failures are returned inside the outcome, never as `Err`.
    pub async fn execute(&self, inputs: &IndexMap<String, Value>, ctx: &BlockContext) -> BlockOutcome {
        match self {
            BlockKind::Start => start::execute(),
            BlockKind::Api(config) => api::execute(config, inputs, ctx.http.as_ref()).await,
            BlockKind::Logic(config) => config.execute(inputs),
            BlockKind::Transform(config) => config.execute(inputs),
            BlockKind::StringBuilder(config) => config.execute(inputs),
            BlockKind::InteractiveUi(_) => BlockOutcome::unchanged(),
        }
    }
}

/// Collaborators a block may use while executing
#[derive(Clone)]
pub struct BlockContext {
    pub http: Arc<dyn HttpClient>,
}

impl BlockContext {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

/// Output values produced by one `execute` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockOutcome {
    pub outputs: IndexMap<String, Value>,
    pub error: Option<String>,
}

impl BlockOutcome {
    pub fn ok(outputs: IndexMap<String, Value>) -> Self {
        Self {
            outputs,
            error: None,
        }
    }

    pub fn failed(outputs: IndexMap<String, Value>, error: impl Into<String>) -> Self {
        Self {
            outputs,
            error: Some(error.into()),
        }
    }

    /// Leaves every output as it was
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn single(key: &str, value: Value) -> Self {
        let mut outputs = IndexMap::new();
        outputs.insert(key.to_string(), value);
        Self::ok(outputs)
    }
}

/// JavaScript-like truthiness used by logic and transform blocks
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_kind_tagged_serialization() {
        let kind = BlockKind::Logic(LogicConfig::default());
        let value = serde_json::to_value(&kind).unwrap();
        assert_eq!(value["type"], "LOGIC");
        assert_eq!(value["operation"], "add");

        let start: BlockKind = serde_json::from_value(json!({"type": "START"})).unwrap();
        assert_eq!(start, BlockKind::Start);
    }

    #[test]
    fn test_react_alias() {
        let kind: BlockKind = serde_json::from_value(json!({"type": "REACT"})).unwrap();
        assert_eq!(kind.block_type(), BlockType::InteractiveUi);

        let tag: BlockType = serde_json::from_value(json!("REACT")).unwrap();
        assert_eq!(tag, BlockType::InteractiveUi);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let kind: BlockKind =
            serde_json::from_value(json!({"type": "TRANSFORM"})).unwrap();
        assert_eq!(kind, BlockKind::Transform(TransformConfig::default()));
    }

    #[test]
    fn test_ports_editable_only_for_schema_driven_variants() {
        assert!(BlockKind::from_type(BlockType::Api).ports_editable());
        assert!(BlockKind::from_type(BlockType::InteractiveUi).ports_editable());
        assert!(!BlockKind::from_type(BlockType::Logic).ports_editable());
        assert!(!BlockKind::Start.ports_editable());
    }

    #[test]
    fn test_block_type_display_matches_serde() {
        for block_type in [
            BlockType::Start,
            BlockType::Api,
            BlockType::Logic,
            BlockType::Transform,
            BlockType::StringBuilder,
            BlockType::InteractiveUi,
        ] {
            let serialized = serde_json::to_value(block_type).unwrap();
            assert_eq!(serialized, json!(block_type.to_string()));
        }
    }

    #[test]
    fn test_truthy() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!([1])));
        assert!(truthy(&json!(true)));
    }
}
