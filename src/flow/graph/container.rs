// SPDX-License-Identifier: MIT

//! Graph Container
//!
//! Owns blocks in an arena keyed by identifier. Connectors hold identifiers
//! only, so every mutation that touches both endpoints goes through here and
//! leaves both sides consistent.

use super::snapshot::{EdgeSnapshot, GraphSnapshot};
use crate::bdk::connector::{BlockId, Connector};
use crate::bdk::error::GraphError;
use crate::bdk::modifier::{Modifier, ModifierRegistry};
use crate::bdk::port::PortSpec;
use crate::flow::blocks::interactive::{self, ON_TEXT_ENTERED};
use crate::flow::blocks::start;
use crate::flow::blocks::{ApiConfig, Block, BlockKind, BlockType, DetachedConnectors};
use crate::flow::catalog::ApiSchema;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What `connect` does when the target input already has a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingPolicy {
    /// Drop the previous connector from both endpoints, then bind
    #[default]
    Replace,
    /// Fail with `PortAlreadyBound`
    Reject,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub name: String,
    blocks: IndexMap<BlockId, Block>,
    binding_policy: BindingPolicy,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_binding_policy(mut self, policy: BindingPolicy) -> Self {
        self.binding_policy = policy;
        self
    }

    pub fn binding_policy(&self) -> BindingPolicy {
        self.binding_policy
    }

    /// Add a block, returning its id
    pub fn add_block(&mut self, block: Block) -> Result<BlockId, GraphError> {
        let id = block.id().to_string();
        if self.blocks.contains_key(&id) {
            return Err(GraphError::DuplicateBlock(id));
        }
        debug!("Adding block '{}' ({}) as {}", block.name, block.block_type(), id);
        self.blocks.insert(id.clone(), block);
        Ok(id)
    }

    /// Remove a block and every connector that references it
    pub fn remove_block(&mut self, id: &str) -> Result<Block, GraphError> {
        let mut removed = self
            .blocks
            .shift_remove(id)
            .ok_or_else(|| GraphError::unknown_block(id))?;

        let mut cut = 0;
        for block in self.blocks.values_mut() {
            cut += block.detach_from(id).len();
        }
        // the removed block keeps no view of its former neighbours
        for block_id in self.blocks.keys() {
            removed.detach_from(block_id);
        }

        info!("Removed block '{}' ({}), {} connector(s) cut", removed.name, id, cut);
        Ok(removed)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn block_mut(&mut self, id: &str) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    /// Like [`Graph::block`] but an absent id is an error
    pub fn get(&self, id: &str) -> Result<&Block, GraphError> {
        self.blocks.get(id).ok_or_else(|| GraphError::unknown_block(id))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Block, GraphError> {
        self.blocks
            .get_mut(id)
            .ok_or_else(|| GraphError::unknown_block(id))
    }

    /// Blocks in insertion order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &BlockId> {
        self.blocks.keys()
    }

    /// Position of a block in insertion order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.blocks.get_index_of(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Ids of Start blocks in insertion order
    pub fn start_blocks(&self) -> Vec<BlockId> {
        self.blocks
            .values()
            .filter(|b| b.block_type() == BlockType::Start)
            .map(|b| b.id().to_string())
            .collect()
    }

    /// Every connector, grouped by source block then source port
    pub fn connectors(&self) -> impl Iterator<Item = &Connector> {
        self.blocks.values().flat_map(|b| b.outgoing())
    }

    pub fn connect(
        &mut self,
        source: &str,
        source_port: &str,
        target: &str,
        target_port: &str,
        modifier: Option<Modifier>,
    ) -> Result<(), GraphError> {
        let source_block = self.get(source)?;
        if !source_block.outputs().contains(source_port) {
            return Err(GraphError::unknown_output(source, source_port));
        }
        let target_block = self.get(target)?;
        if !target_block.inputs().contains(target_port) {
            return Err(GraphError::unknown_input(target, target_port));
        }

        if let Some(existing) = target_block.input_connector(target_port) {
            match self.binding_policy {
                BindingPolicy::Reject => {
                    return Err(GraphError::PortAlreadyBound {
                        block: target.to_string(),
                        port: target_port.to_string(),
                    });
                }
                BindingPolicy::Replace => {
                    let previous = existing.clone();
                    warn!(
                        "Input {}.{} was fed by {}.{}; replacing with {}.{}",
                        target,
                        target_port,
                        previous.source,
                        previous.source_port,
                        source,
                        source_port
                    );
                    if let Some(old_source) = self.blocks.get_mut(&previous.source) {
                        old_source.remove_outgoing(
                            &previous.source_port,
                            &previous.target,
                            &previous.target_port,
                        );
                    }
                }
            }
        }

        let connector =
            Connector::new(source, source_port, target, target_port).with_modifier(modifier);
        self.get_mut(target)?.bind_input(connector.clone());
        self.get_mut(source)?.push_outgoing(connector);
        Ok(())
    }

    /// Remove the first matching connector and clear the target binding
    pub fn disconnect(
        &mut self,
        source: &str,
        source_port: &str,
        target: &str,
        target_port: &str,
    ) -> Result<Connector, GraphError> {
        let source_block = self.get(source)?;
        if !source_block.outputs().contains(source_port) {
            return Err(GraphError::unknown_output(source, source_port));
        }
        if !self.get(target)?.inputs().contains(target_port) {
            return Err(GraphError::unknown_input(target, target_port));
        }

        let removed = self
            .get_mut(source)?
            .remove_outgoing(source_port, target, target_port)
            .ok_or_else(|| GraphError::ConnectorNotFound {
                source_block: source.to_string(),
                source_port: source_port.to_string(),
                target_block: target.to_string(),
                target_port: target_port.to_string(),
            })?;

        let target_block = self.get_mut(target)?;
        let bound_here = target_block
            .input_connector(target_port)
            .is_some_and(|c| c.source == source && c.source_port == source_port);
        if bound_here {
            target_block.unbind_input(target_port);
        }
        Ok(removed)
    }

    /// Pull every bound input of a block from its source output.
    ///
    /// Unbound inputs keep their value. A binding whose source vanished is
    /// skipped.
    pub fn fetch_inputs(&mut self, id: &str) -> Result<(), GraphError> {
        let block = self.get(id)?;
        let mut pulled = Vec::new();
        for connector in block.incoming() {
            let source_value = self
                .blocks
                .get(&connector.source)
                .and_then(|source| source.output(&connector.source_port));
            match source_value {
                Some(value) => {
                    pulled.push((connector.target_port.clone(), connector.carry(value.clone())))
                }
                None => warn!(
                    "Input {}.{} is bound to missing {}.{}; keeping its value",
                    id, connector.target_port, connector.source, connector.source_port
                ),
            }
        }

        let block = self.get_mut(id)?;
        for (key, value) in pulled {
            block.store_input(&key, value);
        }
        Ok(())
    }

    /// Reconcile an InteractiveUI block's ports with an editor-supplied list.
    ///
    /// The conventional `title` input and `onTextEntered` output always stay.
    pub fn sync_ports(
        &mut self,
        id: &str,
        inputs: &[PortSpec],
        outputs: &[PortSpec],
    ) -> Result<(), GraphError> {
        let block = self.get_mut(id)?;
        if !matches!(block.kind(), BlockKind::InteractiveUi(_)) {
            return Err(not_editable(block));
        }
        let detached = block.reconcile_ports(
            inputs,
            outputs,
            interactive::is_default_input,
            interactive::is_default_output,
        );
        self.clear_detached(id, detached);
        Ok(())
    }

    /// Re-derive an API block's ports and request shape from a catalog entry
    pub fn apply_schema(&mut self, id: &str, key: &str, schema: &ApiSchema) -> Result<(), GraphError> {
        let block = self.get_mut(id)?;
        if !matches!(block.kind(), BlockKind::Api(_)) {
            return Err(not_editable(block));
        }
        let ports = ApiConfig::from_schema(key, schema);
        let detached = block.reconcile_ports(
            &ports.inputs,
            &ports.outputs,
            |k| k == start::TRIGGER,
            ApiConfig::is_standard_output,
        );
        block.replace_api_config(ports.config);
        self.clear_detached(id, detached);
        info!("Applied schema '{}' to API block {}", key, id);
        Ok(())
    }

    /// Clear the far endpoint of connectors cut from block `id`
    fn clear_detached(&mut self, id: &str, detached: DetachedConnectors) {
        for connector in detached.incoming {
            if let Some(source) = self.blocks.get_mut(&connector.source) {
                source.remove_outgoing(
                    &connector.source_port,
                    &connector.target,
                    &connector.target_port,
                );
            }
        }
        for connector in detached.outgoing {
            if let Some(target) = self.blocks.get_mut(&connector.target) {
                let bound_here = target
                    .input_connector(&connector.target_port)
                    .is_some_and(|c| c.source == id && c.source_port == connector.source_port);
                if bound_here {
                    target.unbind_input(&connector.target_port);
                }
            }
        }
    }

    /// Deposit a value reported by an external surface into an output
    pub fn report_output(&mut self, id: &str, port: &str, value: Value) -> Result<(), GraphError> {
        self.get_mut(id)?.set_output(port, value)
    }

    /// Seed InteractiveUI outputs before a run.
    ///
    /// All ids are checked before anything is written. Returns the ids that
    /// were seeded; blocks of other variants are skipped.
    pub fn seed(&mut self, values: &IndexMap<String, Value>) -> Result<Vec<BlockId>, GraphError> {
        if let Some(missing) = values.keys().find(|id| !self.blocks.contains_key(*id)) {
            return Err(GraphError::unknown_block(missing.as_str()));
        }

        let mut seeded = Vec::new();
        for (id, value) in values {
            let block = self.get_mut(id)?;
            if block.block_type() != BlockType::InteractiveUi {
                warn!(
                    "Ignoring initial value for {} block '{}' ({})",
                    block.block_type(),
                    block.name,
                    id
                );
                continue;
            }
            block.set_output(ON_TEXT_ENTERED, value.clone())?;
            seeded.push(id.clone());
        }
        Ok(seeded)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let blocks = self.blocks.values().map(|b| b.snapshot()).collect();
        let edges = self
            .connectors()
            .map(|c| EdgeSnapshot {
                source: c.source.clone(),
                source_port: c.source_port.clone(),
                target: c.target.clone(),
                target_port: c.target_port.clone(),
                modifier: c.modifier_name().map(str::to_string),
            })
            .collect();
        GraphSnapshot {
            name: self.name.clone(),
            blocks,
            edges,
        }
    }

    /// Rebuild a graph, resolving edge modifiers by name
    pub fn from_snapshot(
        snapshot: &GraphSnapshot,
        modifiers: &ModifierRegistry,
    ) -> Result<Self, GraphError> {
        let mut graph = Graph::named(snapshot.name.clone());
        for block in &snapshot.blocks {
            graph.add_block(Block::from_snapshot(block))?;
        }
        for edge in &snapshot.edges {
            let modifier = edge
                .modifier
                .as_deref()
                .map(|name| modifiers.resolve(name))
                .transpose()?;
            graph.connect(
                &edge.source,
                &edge.source_port,
                &edge.target,
                &edge.target_port,
                modifier,
            )?;
        }
        debug!(
            "Restored graph '{}' with {} blocks and {} edges",
            graph.name,
            graph.len(),
            snapshot.edges.len()
        );
        Ok(graph)
    }
}

fn not_editable(block: &Block) -> GraphError {
    GraphError::PortsNotEditable {
        block: block.id().to_string(),
        block_type: block.block_type().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bdk::port::DataKind;
    use crate::flow::blocks::start::{GO, TRIGGER};
    use crate::flow::blocks::{LogicOperation, TransformConfig};
    use crate::flow::catalog::SchemaCatalog;
    use serde_json::json;

    fn pipeline() -> (Graph, BlockId, BlockId, BlockId) {
        let mut graph = Graph::named("pipeline");
        let s = graph.add_block(Block::start("S")).unwrap();
        let l = graph
            .add_block(Block::logic("L", LogicOperation::Concat))
            .unwrap();
        let t = graph
            .add_block(Block::transform("T", TransformConfig::default()))
            .unwrap();
        graph.connect(&s, GO, &l, "val_a", None).unwrap();
        graph.connect(&l, "result", &t, "input", None).unwrap();
        (graph, s, l, t)
    }

    #[test]
    fn test_duplicate_block_rejected() {
        let mut graph = Graph::new();
        let block = Block::start("S");
        graph.add_block(block.clone()).unwrap();
        assert_eq!(
            graph.add_block(block.clone()).unwrap_err(),
            GraphError::DuplicateBlock(block.id().to_string())
        );
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_connect_validates_ports_and_blocks() {
        let (mut graph, s, l, _) = pipeline();
        assert_eq!(
            graph.connect(&s, "nope", &l, "val_b", None).unwrap_err(),
            GraphError::unknown_output(s.as_str(), "nope")
        );
        assert_eq!(
            graph.connect(&s, GO, &l, "val_z", None).unwrap_err(),
            GraphError::unknown_input(l.as_str(), "val_z")
        );
        assert_eq!(
            graph.connect("ghost", GO, &l, "val_b", None).unwrap_err(),
            GraphError::unknown_block("ghost")
        );
        // failed connects leave no trace
        assert_eq!(graph.connectors().count(), 2);
    }

    #[test]
    fn test_replace_binding_drops_old_edge_from_both_ends() {
        let (mut graph, s, l, _) = pipeline();
        let ui = graph.add_block(Block::interactive("UI")).unwrap();

        graph.connect(&ui, ON_TEXT_ENTERED, &l, "val_a", None).unwrap();

        let bound = graph.get(&l).unwrap().input_connector("val_a").unwrap();
        assert_eq!(bound.source, ui);
        assert!(graph.get(&s).unwrap().output_connectors(GO).is_empty());
        assert_eq!(graph.connectors().count(), 2);
    }

    #[test]
    fn test_reject_binding_policy() {
        let (graph, _, l, _) = pipeline();
        let mut graph = graph.with_binding_policy(BindingPolicy::Reject);
        let ui = graph.add_block(Block::interactive("UI")).unwrap();

        let err = graph
            .connect(&ui, ON_TEXT_ENTERED, &l, "val_a", None)
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::PortAlreadyBound {
                block: l.clone(),
                port: "val_a".to_string()
            }
        );
        assert!(graph.get(&ui).unwrap().output_connectors(ON_TEXT_ENTERED).is_empty());
    }

    #[test]
    fn test_fan_out_is_unlimited() {
        let (mut graph, s, _, _) = pipeline();
        let other = graph
            .add_block(Block::logic("L2", LogicOperation::And))
            .unwrap();
        graph.connect(&s, GO, &other, "val_a", None).unwrap();
        graph.connect(&s, GO, &other, "val_b", None).unwrap();
        assert_eq!(graph.get(&s).unwrap().output_connectors(GO).len(), 3);
    }

    #[test]
    fn test_disconnect_clears_both_sides() {
        let (mut graph, s, l, _) = pipeline();
        let removed = graph.disconnect(&s, GO, &l, "val_a").unwrap();
        assert_eq!(removed.target, l);
        assert!(graph.get(&s).unwrap().output_connectors(GO).is_empty());
        assert!(graph.get(&l).unwrap().input_connector("val_a").is_none());

        let err = graph.disconnect(&s, GO, &l, "val_a").unwrap_err();
        assert!(matches!(err, GraphError::ConnectorNotFound { .. }));
    }

    #[test]
    fn test_remove_block_excises_connectors() {
        let (mut graph, s, l, t) = pipeline();
        let removed = graph.remove_block(&l).unwrap();

        assert_eq!(removed.name, "L");
        assert!(graph.get(&s).unwrap().output_connectors(GO).is_empty());
        assert!(graph.get(&t).unwrap().input_connector("input").is_none());
        assert_eq!(graph.connectors().count(), 0);
        assert!(removed.outgoing().next().is_none());
        assert_eq!(
            graph.remove_block(&l).unwrap_err(),
            GraphError::unknown_block(l.as_str())
        );
    }

    #[test]
    fn test_fetch_inputs_pulls_and_applies_modifier() {
        let mut graph = Graph::new();
        let ui = graph.add_block(Block::interactive("UI")).unwrap();
        let api = graph.add_block(Block::api("A")).unwrap();
        graph
            .connect(&ui, ON_TEXT_ENTERED, &api, "params", Some(Modifier::wrap("q")))
            .unwrap();
        graph.get_mut(&api).unwrap().set_input("url", json!("https://x.test")).unwrap();

        graph.report_output(&ui, ON_TEXT_ENTERED, json!("cats")).unwrap();
        graph.fetch_inputs(&api).unwrap();

        let api_block = graph.get(&api).unwrap();
        assert_eq!(api_block.input("params"), Some(&json!({"q": "cats"})));
        // unbound input untouched
        assert_eq!(api_block.input("url"), Some(&json!("https://x.test")));
        // the source output is not modified by the edge
        assert_eq!(graph.get(&ui).unwrap().output(ON_TEXT_ENTERED), Some(&json!("cats")));
    }

    #[test]
    fn test_sync_ports_removes_connectors_on_both_endpoints() {
        let mut graph = Graph::new();
        let ui = graph.add_block(Block::interactive("UI")).unwrap();
        let l = graph
            .add_block(Block::logic("L", LogicOperation::Add))
            .unwrap();
        let s = graph.add_block(Block::start("S")).unwrap();

        graph
            .sync_ports(
                &ui,
                &[PortSpec::new("flag", DataKind::Boolean)],
                &[PortSpec::new("onSubmit", DataKind::Any)],
            )
            .unwrap();
        graph.connect(&ui, "onSubmit", &l, "val_a", None).unwrap();
        graph.connect(&s, GO, &ui, "flag", None).unwrap();

        graph.sync_ports(&ui, &[], &[]).unwrap();

        let ui_block = graph.get(&ui).unwrap();
        assert!(ui_block.inputs().contains("title"));
        assert!(ui_block.outputs().contains(ON_TEXT_ENTERED));
        assert!(!ui_block.inputs().contains("flag"));
        assert!(graph.get(&l).unwrap().input_connector("val_a").is_none());
        assert!(graph.get(&s).unwrap().output_connectors(GO).is_empty());
    }

    #[test]
    fn test_sync_ports_only_for_interactive_blocks() {
        let (mut graph, _, l, _) = pipeline();
        let err = graph.sync_ports(&l, &[], &[]).unwrap_err();
        assert!(matches!(err, GraphError::PortsNotEditable { .. }));
    }

    #[tokio::test]
    async fn test_apply_schema_reshapes_api_block() {
        let catalog = SchemaCatalog::builtin();
        let mut graph = Graph::new();
        let s = graph.add_block(Block::start("S")).unwrap();
        let api = graph.add_block(Block::api("A")).unwrap();
        let t = graph
            .add_block(Block::transform("T", TransformConfig::default()))
            .unwrap();
        graph.connect(&s, GO, &api, "url", None).unwrap();
        graph.connect(&api, "response_json", &t, "input", None).unwrap();

        let schema = catalog.get("cat_fact").await.unwrap();
        graph.apply_schema(&api, "cat_fact", &schema).unwrap();

        let block = graph.get(&api).unwrap();
        let inputs: Vec<&str> = block.inputs().keys().map(|k| k.as_str()).collect();
        assert_eq!(inputs, vec![TRIGGER]);
        assert!(block.outputs().contains("fact"));
        // standard outputs and their edges survive
        assert!(graph.get(&t).unwrap().input_connector("input").is_some());
        assert!(graph.get(&s).unwrap().output_connectors(GO).is_empty());
    }

    #[test]
    fn test_seed_validates_then_writes() {
        let mut graph = Graph::new();
        let ui = graph.add_block(Block::interactive("UI")).unwrap();
        let s = graph.add_block(Block::start("S")).unwrap();

        let mut values = IndexMap::new();
        values.insert(ui.clone(), json!("World"));
        values.insert("ghost".to_string(), json!("x"));
        assert!(graph.seed(&values).is_err());
        assert_eq!(graph.get(&ui).unwrap().output(ON_TEXT_ENTERED), Some(&json!("")));

        values.shift_remove("ghost");
        values.insert(s.clone(), json!(true));
        let seeded = graph.seed(&values).unwrap();
        assert_eq!(seeded, vec![ui.clone()]);
        assert_eq!(
            graph.get(&ui).unwrap().output(ON_TEXT_ENTERED),
            Some(&json!("World"))
        );
        assert_eq!(graph.get(&s).unwrap().output(GO), Some(&json!(false)));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut graph = Graph::named("round trip");
        let s = graph.add_block(Block::start("S").at(1.0, 2.0)).unwrap();
        let ui = graph.add_block(Block::interactive("UI")).unwrap();
        let l = graph
            .add_block(Block::logic("L", LogicOperation::Concat))
            .unwrap();
        let a = graph.add_block(Block::api("A")).unwrap();
        graph.connect(&s, GO, &ui, "title", None).unwrap();
        graph.connect(&ui, ON_TEXT_ENTERED, &l, "val_b", None).unwrap();
        graph
            .connect(&l, "result", &a, "params", Some(Modifier::wrap("message")))
            .unwrap();
        graph.get_mut(&l).unwrap().set_input("val_a", json!("Hello ")).unwrap();
        graph.get_mut(&a).unwrap().toggle_input_visibility("headers");

        let snapshot = graph.snapshot();
        let text = serde_json::to_string(&snapshot).unwrap();
        let parsed: GraphSnapshot = serde_json::from_str(&text).unwrap();
        let restored = Graph::from_snapshot(&parsed, &ModifierRegistry::new()).unwrap();

        assert_eq!(restored.snapshot(), snapshot);
        let ids: Vec<&BlockId> = restored.ids().collect();
        assert_eq!(ids, vec![&s, &ui, &l, &a]);
        let edge = restored.get(&a).unwrap().input_connector("params").unwrap();
        assert_eq!(edge.modifier_name(), Some("wrap:message"));
    }

    #[test]
    fn test_from_snapshot_unknown_modifier() {
        let (graph, _, _, _) = pipeline();
        let mut snapshot = graph.snapshot();
        snapshot.edges[0].modifier = Some("shout".to_string());
        let err = Graph::from_snapshot(&snapshot, &ModifierRegistry::new()).unwrap_err();
        assert_eq!(err, GraphError::UnknownModifier("shout".to_string()));
    }
}
