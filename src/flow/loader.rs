// SPDX-License-Identifier: MIT

//! Graph loader - JSON/YAML graph documents and seed files
//!
//! Documents are parsed into a [`GraphSnapshot`] first and only then built
//! into a [`Graph`], so structural errors (unknown ports, modifiers) surface
//! from the same code path as programmatic edits.

use crate::bdk::connector::BlockId;
use crate::bdk::error::{FlowError, Result};
use crate::bdk::modifier::ModifierRegistry;
use crate::flow::graph::{Graph, GraphSnapshot};
use indexmap::IndexMap;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Loads graph documents and builds them with a modifier registry
#[derive(Clone, Default)]
pub struct GraphLoader {
    modifiers: ModifierRegistry,
}

impl GraphLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_modifiers(modifiers: ModifierRegistry) -> Self {
        Self { modifiers }
    }

    pub fn modifiers(&self) -> &ModifierRegistry {
        &self.modifiers
    }

    /// Load a snapshot from a `.json`, `.yaml` or `.yml` file.
    ///
    /// Other extensions fall back to content sniffing.
    pub fn load_graph<P: AsRef<Path>>(&self, path: P) -> Result<GraphSnapshot> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let document: Value = match extension(path) {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => return Self::parse_graph(&content),
        };
        let snapshot = Self::from_value(document)?;
        log::info!(
            "Loaded graph '{}' from {} ({} blocks, {} edges)",
            snapshot.name,
            path.display(),
            snapshot.blocks.len(),
            snapshot.edges.len()
        );
        Ok(snapshot)
    }

    /// Parse a snapshot from a string; a leading `{` means JSON, else YAML
    pub fn parse_graph(content: &str) -> Result<GraphSnapshot> {
        let document: Value = if content.trim_start().starts_with('{') {
            serde_json::from_str(content)?
        } else {
            serde_yaml::from_str(content)?
        };
        Self::from_value(document)
    }

    /// Load an initial-values map (block id to value)
    pub fn load_seeds<P: AsRef<Path>>(&self, path: P) -> Result<IndexMap<BlockId, Value>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let seeds: IndexMap<BlockId, Value> = match extension(path) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        log::debug!("Loaded {} seed value(s) from {}", seeds.len(), path.display());
        Ok(seeds)
    }

    pub fn build(&self, snapshot: &GraphSnapshot) -> Result<Graph> {
        Ok(Graph::from_snapshot(snapshot, &self.modifiers)?)
    }

    /// Load and build in one step
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Graph> {
        let snapshot = self.load_graph(path)?;
        self.build(&snapshot)
    }

    /// Snapshot from an already parsed document, e.g. an HTTP request body
    pub fn from_value(mut document: Value) -> Result<GraphSnapshot> {
        if !document.is_object() {
            return Err(FlowError::config("graph document must be an object"));
        }
        normalize(&mut document);
        Ok(serde_json::from_value(document)?)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

/// Rename imported-workflow `block_type` keys to `type`.
///
/// The variant tag is flattened into the block, so serde aliases cannot
/// reach it.
fn normalize(document: &mut Value) {
    for list in ["blocks", "nodes"] {
        let Some(Value::Array(blocks)) = document.get_mut(list) else {
            continue;
        };
        for block in blocks.iter_mut().filter_map(Value::as_object_mut) {
            if block.contains_key("type") {
                continue;
            }
            if let Some(tag) = block.remove("block_type") {
                block.insert("type".to_string(), tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::blocks::BlockType;
    use serde_json::json;
    use std::io::Write;

    const YAML: &str = r#"
name: greeter
nodes:
  - id: s
    block_type: START
  - id: ui
    block_type: REACT
  - id: l
    type: LOGIC
    operation: concat
    inputs:
      - key: val_a
        data_type: string
        value: "Hello "
      - key: val_b
        data_type: string
connections:
  - source_id: s
    source_output: go
    target_id: ui
    target_input: trigger
  - source: ui
    source_port: onTextEntered
    target: l
    target_port: val_b
    modifier: to_string
"#;

    #[test]
    fn test_parse_yaml_with_imported_aliases() {
        let snapshot = GraphLoader::parse_graph(YAML).unwrap();
        assert_eq!(snapshot.name, "greeter");
        assert_eq!(snapshot.blocks.len(), 3);
        assert_eq!(snapshot.blocks[1].kind.block_type(), BlockType::InteractiveUi);
        assert_eq!(snapshot.edges[0].source_port, "go");
        assert_eq!(snapshot.edges[1].modifier.as_deref(), Some("to_string"));

        let graph = GraphLoader::new().build(&snapshot).unwrap();
        assert_eq!(graph.start_blocks(), vec!["s".to_string()]);
        assert_eq!(graph.get("l").unwrap().input("val_a"), Some(&json!("Hello ")));
        // names default to the type name
        assert_eq!(graph.get("s").unwrap().name, "START");
    }

    #[test]
    fn test_parse_json_by_sniffing() {
        let text = json!({
            "name": "tiny",
            "blocks": [{"id": "s", "type": "START"}],
            "edges": []
        })
        .to_string();
        let snapshot = GraphLoader::parse_graph(&text).unwrap();
        assert_eq!(snapshot.blocks[0].id, "s");
    }

    #[test]
    fn test_non_object_document_rejected() {
        assert!(matches!(
            GraphLoader::parse_graph("- a\n- b\n"),
            Err(FlowError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_edge_port_fails_build() {
        let text = json!({
            "blocks": [{"id": "s", "type": "START"}, {"id": "t", "type": "TRANSFORM"}],
            "edges": [{"source": "s", "source_port": "go", "target": "t", "target_port": "nope"}]
        })
        .to_string();
        let snapshot = GraphLoader::parse_graph(&text).unwrap();
        assert!(matches!(
            GraphLoader::new().build(&snapshot),
            Err(FlowError::Graph(_))
        ));
    }

    #[test]
    fn test_load_files() {
        let mut graph_file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        graph_file.write_all(YAML.as_bytes()).unwrap();
        let mut seed_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(seed_file, r#"{{"ui": "World"}}"#).unwrap();

        let loader = GraphLoader::new();
        let graph = loader.load(graph_file.path()).unwrap();
        assert_eq!(graph.len(), 3);

        let seeds = loader.load_seeds(seed_file.path()).unwrap();
        assert_eq!(seeds["ui"], json!("World"));
    }
}
