// SPDX-License-Identifier: MIT

//! Structural graph snapshots
//!
//! The wire form of a [`Graph`](super::Graph): blocks with their ports and
//! variant config, plus edges referencing blocks by id and modifiers by name.
//! Imported-workflow field names are accepted as aliases.

use crate::bdk::port::DataKind;
use crate::flow::blocks::BlockKind;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "nodes")]
    pub blocks: Vec<BlockSnapshot>,
    #[serde(default, alias = "connections")]
    pub edges: Vec<EdgeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlockSnapshot {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(flatten)]
    pub kind: BlockKind,
    #[serde(default)]
    pub inputs: Vec<PortSnapshot>,
    #[serde(default)]
    pub outputs: Vec<PortSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_inputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hidden_outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PortSnapshot {
    pub key: String,
    #[serde(default)]
    pub data_type: DataKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Absent means "start from the default"; an explicit null is kept
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EdgeSnapshot {
    #[serde(alias = "source_id")]
    pub source: String,
    #[serde(default = "default_source_port", alias = "source_output")]
    pub source_port: String,
    #[serde(alias = "target_id")]
    pub target: String,
    #[serde(default = "default_target_port", alias = "target_input")]
    pub target_port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
}

fn default_source_port() -> String {
    "output".to_string()
}

fn default_target_port() -> String {
    "input".to_string()
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::blocks::{BlockType, LogicOperation};
    use serde_json::json;

    #[test]
    fn test_block_snapshot_flattens_variant() {
        let snapshot: BlockSnapshot = serde_json::from_value(json!({
            "id": "l1",
            "name": "Join",
            "type": "LOGIC",
            "operation": "concat",
            "inputs": [{"key": "val_a", "data_type": "string", "value": "Hello "}]
        }))
        .unwrap();

        assert_eq!(snapshot.kind.block_type(), BlockType::Logic);
        match &snapshot.kind {
            crate::flow::blocks::BlockKind::Logic(config) => {
                assert_eq!(config.operation, LogicOperation::Concat)
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(snapshot.inputs[0].value, Some(json!("Hello ")));
        assert!(snapshot.outputs.is_empty());

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["type"], "LOGIC");
        assert_eq!(value["operation"], "concat");
    }

    #[test]
    fn test_explicit_null_value_is_kept() {
        let port: PortSnapshot =
            serde_json::from_value(json!({"key": "k", "value": null})).unwrap();
        assert_eq!(port.value, Some(Value::Null));

        let port: PortSnapshot = serde_json::from_value(json!({"key": "k"})).unwrap();
        assert_eq!(port.value, None);
    }

    #[test]
    fn test_imported_workflow_aliases() {
        let snapshot: GraphSnapshot = serde_json::from_value(json!({
            "nodes": [{"id": "ui", "type": "REACT"}],
            "connections": [{"source_id": "ui", "target_id": "t"}]
        }))
        .unwrap();

        assert_eq!(snapshot.blocks[0].kind.block_type(), BlockType::InteractiveUi);
        let edge = &snapshot.edges[0];
        assert_eq!(edge.source, "ui");
        assert_eq!(edge.source_port, "output");
        assert_eq!(edge.target_port, "input");
        assert_eq!(edge.modifier, None);
    }
}
