// SPDX-License-Identifier: MIT

use super::api::{self, SchemaPorts};
use super::{
    ApiConfig, BlockKind, BlockType, InteractiveConfig, LogicConfig, LogicOperation,
    StringBuilderConfig, TransformConfig,
};
use crate::bdk::connector::{BlockId, Connector};
use crate::bdk::error::{GraphError, PortDirection};
use crate::bdk::port::{DataKind, PortSet, PortSpec};
use crate::flow::graph::snapshot::{BlockSnapshot, PortSnapshot};
use indexmap::IndexMap;
use serde_json::Value;
use uuid::Uuid;

/// Connectors cut loose by a port or block removal.
///
/// The graph uses these to clear the other endpoint of each edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetachedConnectors {
    /// Former bindings of this block's inputs
    pub incoming: Vec<Connector>,
    /// Former edges leaving this block's outputs
    pub outgoing: Vec<Connector>,
}

impl DetachedConnectors {
    pub fn is_empty(&self) -> bool {
        self.incoming.is_empty() && self.outgoing.is_empty()
    }

    pub fn len(&self) -> usize {
        self.incoming.len() + self.outgoing.len()
    }
}

/// A node of the graph: identity, ports and connector bookkeeping
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    kind: BlockKind,
    inputs: PortSet,
    outputs: PortSet,
    input_connectors: IndexMap<String, Option<Connector>>,
    output_connectors: IndexMap<String, Vec<Connector>>,
}

impl Block {
    /// Create a block with a fresh identifier and the variant's declared ports
    pub fn new(name: impl Into<String>, kind: BlockKind) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, kind)
    }

    pub fn with_id(id: impl Into<BlockId>, name: impl Into<String>, kind: BlockKind) -> Self {
        let mut inputs = PortSet::new();
        let mut outputs = PortSet::new();
        kind.declare_ports(&mut inputs, &mut outputs);
        Self::assemble(id.into(), name.into(), kind, inputs, outputs)
    }

    fn assemble(
        id: BlockId,
        name: String,
        kind: BlockKind,
        inputs: PortSet,
        outputs: PortSet,
    ) -> Self {
        let input_connectors = inputs.keys().map(|k| (k.clone(), None)).collect();
        let output_connectors = outputs.keys().map(|k| (k.clone(), Vec::new())).collect();
        Self {
            id,
            name,
            x: 0.0,
            y: 0.0,
            kind,
            inputs,
            outputs,
            input_connectors,
            output_connectors,
        }
    }

    pub fn start(name: impl Into<String>) -> Self {
        Self::new(name, BlockKind::Start)
    }

    pub fn logic(name: impl Into<String>, operation: LogicOperation) -> Self {
        Self::new(name, BlockKind::Logic(LogicConfig::new(operation)))
    }

    pub fn transform(name: impl Into<String>, config: TransformConfig) -> Self {
        Self::new(name, BlockKind::Transform(config))
    }

    pub fn string_builder(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self::new(
            name,
            BlockKind::StringBuilder(StringBuilderConfig::new(template)),
        )
    }

    pub fn interactive(name: impl Into<String>) -> Self {
        Self::new(name, BlockKind::InteractiveUi(InteractiveConfig::default()))
    }

    /// API block with the generic "custom" inputs
    pub fn api(name: impl Into<String>) -> Self {
        Self::new(name, BlockKind::Api(ApiConfig::default()))
    }

    /// API block whose ports come from a catalog schema
    pub fn api_with_schema(name: impl Into<String>, ports: SchemaPorts) -> Self {
        let mut block = Self::new(name, BlockKind::Api(ports.config));
        for spec in &ports.inputs {
            block.register_input(&spec.key, spec.data_type, spec.default.clone());
        }
        for spec in &ports.outputs {
            block.register_output(&spec.key, spec.data_type);
        }
        block
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn block_type(&self) -> BlockType {
        self.kind.block_type()
    }

    pub fn kind(&self) -> &BlockKind {
        &self.kind
    }

    pub fn inputs(&self) -> &PortSet {
        &self.inputs
    }

    pub fn outputs(&self) -> &PortSet {
        &self.outputs
    }

    pub fn input(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key)
    }

    pub fn output(&self, key: &str) -> Option<&Value> {
        self.outputs.get(key)
    }

    /// Declare an input if absent; existing ports and bindings are untouched
    pub fn register_input(&mut self, key: &str, data_type: DataKind, default: Option<Value>) -> bool {
        let added = self.inputs.register(key, data_type, default);
        if added {
            self.input_connectors.insert(key.to_string(), None);
        }
        added
    }

    pub fn register_output(&mut self, key: &str, data_type: DataKind) -> bool {
        let added = self.outputs.register(key, data_type, None);
        if added {
            self.output_connectors.insert(key.to_string(), Vec::new());
        }
        added
    }

    /// Like [`Block::register_input`] but a second declaration is an error
    pub fn register_input_strict(
        &mut self,
        key: &str,
        data_type: DataKind,
        default: Option<Value>,
    ) -> Result<(), GraphError> {
        if self.register_input(key, data_type, default) {
            Ok(())
        } else {
            Err(GraphError::DuplicatePort {
                block: self.id.clone(),
                port: key.to_string(),
                direction: PortDirection::Input,
            })
        }
    }

    pub fn register_output_strict(&mut self, key: &str, data_type: DataKind) -> Result<(), GraphError> {
        if self.register_output(key, data_type) {
            Ok(())
        } else {
            Err(GraphError::DuplicatePort {
                block: self.id.clone(),
                port: key.to_string(),
                direction: PortDirection::Output,
            })
        }
    }

    /// User-set input value
    pub fn set_input(&mut self, key: &str, value: Value) -> Result<(), GraphError> {
        if self.inputs.set(key, value) {
            Ok(())
        } else {
            Err(GraphError::unknown_input(&self.id, key))
        }
    }

    /// Externally reported output value
    pub fn set_output(&mut self, key: &str, value: Value) -> Result<(), GraphError> {
        if self.outputs.set(key, value) {
            Ok(())
        } else {
            Err(GraphError::unknown_output(&self.id, key))
        }
    }

    pub fn toggle_input_visibility(&mut self, key: &str) {
        self.inputs.toggle_visibility(key);
    }

    pub fn toggle_output_visibility(&mut self, key: &str) {
        self.outputs.toggle_visibility(key);
    }

    pub fn set_operation(&mut self, operation: LogicOperation) -> bool {
        match &mut self.kind {
            BlockKind::Logic(config) => {
                config.operation = operation;
                true
            }
            _ => false,
        }
    }

    pub fn set_transformation(&mut self, transform: TransformConfig) -> bool {
        match &mut self.kind {
            BlockKind::Transform(config) => {
                *config = transform;
                true
            }
            _ => false,
        }
    }

    /// Replace a StringBuilder template, declaring any new placeholders.
    ///
    /// Ports of placeholders that disappeared are kept with their bindings.
    pub fn set_template(&mut self, template: impl Into<String>) -> bool {
        let config = match &mut self.kind {
            BlockKind::StringBuilder(config) => {
                config.template = template.into();
                config.clone()
            }
            _ => return false,
        };
        for name in config.placeholders() {
            self.register_input(&name, DataKind::String, None);
        }
        true
    }

    pub fn input_connector(&self, key: &str) -> Option<&Connector> {
        self.input_connectors.get(key).and_then(|c| c.as_ref())
    }

    pub fn output_connectors(&self, key: &str) -> &[Connector] {
        self.output_connectors
            .get(key)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Outgoing connectors in port declaration order
    pub fn outgoing(&self) -> impl Iterator<Item = &Connector> {
        self.output_connectors.values().flatten()
    }

    /// Bound input connectors in port declaration order
    pub fn incoming(&self) -> impl Iterator<Item = &Connector> {
        self.input_connectors.values().flatten()
    }

    /// Install a binding, returning the one it replaced
    pub(crate) fn bind_input(&mut self, connector: Connector) -> Option<Connector> {
        let key = connector.target_port.clone();
        self.input_connectors
            .insert(key, Some(connector))
            .flatten()
    }

    pub(crate) fn unbind_input(&mut self, key: &str) -> Option<Connector> {
        self.input_connectors.get_mut(key).and_then(|slot| slot.take())
    }

    pub(crate) fn push_outgoing(&mut self, connector: Connector) {
        self.output_connectors
            .entry(connector.source_port.clone())
            .or_default()
            .push(connector);
    }

    /// Remove the first outgoing connector with these endpoints
    pub(crate) fn remove_outgoing(
        &mut self,
        source_port: &str,
        target: &str,
        target_port: &str,
    ) -> Option<Connector> {
        let list = self.output_connectors.get_mut(source_port)?;
        let index = list
            .iter()
            .position(|c| c.matches(source_port, target, target_port))?;
        Some(list.remove(index))
    }

    /// Drop every edge to or from `other` held by this block
    pub(crate) fn detach_from(&mut self, other: &str) -> DetachedConnectors {
        let mut detached = DetachedConnectors::default();
        for list in self.output_connectors.values_mut() {
            let (gone, kept): (Vec<_>, Vec<_>) =
                list.drain(..).partition(|c| c.target == other);
            *list = kept;
            detached.outgoing.extend(gone);
        }
        for slot in self.input_connectors.values_mut() {
            if slot.as_ref().is_some_and(|c| c.source == other) {
                detached.incoming.extend(slot.take());
            }
        }
        detached
    }

    /// Store an execution result. Undeclared keys are ignored.
    pub(crate) fn apply_outputs(&mut self, outputs: IndexMap<String, Value>) {
        for (key, value) in outputs {
            if !self.outputs.set(&key, value) {
                log::debug!("Block '{}' produced undeclared output '{}'", self.name, key);
            }
        }
    }

    /// Outputs for a run that never produced an outcome (timeout).
    ///
    /// API blocks take their failed-call shape; other variants null every
    /// output and carry the message on an `error` port if they have one.
    pub(crate) fn failure_outputs(&self, message: &str) -> IndexMap<String, Value> {
        match &self.kind {
            BlockKind::Api(config) => api::failure_outputs(config, message),
            _ => self
                .outputs
                .keys()
                .map(|key| {
                    let value = if key == api::ERROR {
                        Value::String(message.to_string())
                    } else {
                        Value::Null
                    };
                    (key.clone(), value)
                })
                .collect(),
        }
    }

    /// Write a value pulled across a connector into an input
    pub(crate) fn store_input(&mut self, key: &str, value: Value) {
        self.inputs.set(key, value);
    }

    /// Reconcile the port set with an externally supplied declaration.
    ///
    /// Ports absent from the new lists are removed unless `keep_*` protects
    /// them; new keys are registered. Returns the connectors the removals
    /// cut, for the caller to clear on the other endpoints.
    pub(crate) fn reconcile_ports(
        &mut self,
        new_inputs: &[PortSpec],
        new_outputs: &[PortSpec],
        keep_input: impl Fn(&str) -> bool,
        keep_output: impl Fn(&str) -> bool,
    ) -> DetachedConnectors {
        let mut detached = DetachedConnectors::default();

        let stale_inputs: Vec<String> = self
            .inputs
            .keys()
            .filter(|k| !keep_input(k.as_str()) && !new_inputs.iter().any(|s| &s.key == *k))
            .cloned()
            .collect();
        for key in stale_inputs {
            self.inputs.remove(&key);
            if let Some(Some(connector)) = self.input_connectors.shift_remove(&key) {
                detached.incoming.push(connector);
            }
        }

        let stale_outputs: Vec<String> = self
            .outputs
            .keys()
            .filter(|k| !keep_output(k.as_str()) && !new_outputs.iter().any(|s| &s.key == *k))
            .cloned()
            .collect();
        for key in stale_outputs {
            self.outputs.remove(&key);
            if let Some(connectors) = self.output_connectors.shift_remove(&key) {
                detached.outgoing.extend(connectors);
            }
        }

        for spec in new_inputs {
            self.register_input(&spec.key, spec.data_type, spec.default.clone());
        }
        for spec in new_outputs {
            self.register_output(&spec.key, spec.data_type);
        }

        detached
    }

    /// Point an API block at another endpoint. Ports are left alone.
    pub fn set_api_target(&mut self, url: impl Into<String>, method: impl Into<String>) -> bool {
        match &mut self.kind {
            BlockKind::Api(config) => {
                config.url = url.into();
                config.method = method.into().to_uppercase();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn replace_api_config(&mut self, config: ApiConfig) {
        if let BlockKind::Api(current) = &mut self.kind {
            *current = config;
        }
    }

    pub fn snapshot(&self) -> BlockSnapshot {
        BlockSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            kind: self.kind.clone(),
            inputs: port_snapshots(&self.inputs),
            outputs: port_snapshots(&self.outputs),
            hidden_inputs: self.inputs.hidden().cloned().collect(),
            hidden_outputs: self.outputs.hidden().cloned().collect(),
        }
    }

    /// Rebuild a block without connectors. Empty port lists fall back to
    /// the variant's declared ports.
    pub fn from_snapshot(snapshot: &BlockSnapshot) -> Self {
        let mut declared_inputs = PortSet::new();
        let mut declared_outputs = PortSet::new();
        snapshot
            .kind
            .declare_ports(&mut declared_inputs, &mut declared_outputs);

        let inputs = restore_ports(&snapshot.inputs, &snapshot.hidden_inputs, declared_inputs);
        let outputs = restore_ports(&snapshot.outputs, &snapshot.hidden_outputs, declared_outputs);

        let name = if snapshot.name.is_empty() {
            snapshot.kind.block_type().to_string()
        } else {
            snapshot.name.clone()
        };

        let mut block = Self::assemble(snapshot.id.clone(), name, snapshot.kind.clone(), inputs, outputs);
        block.x = snapshot.x;
        block.y = snapshot.y;
        block
    }
}

fn port_snapshots(ports: &PortSet) -> Vec<PortSnapshot> {
    ports
        .iter()
        .map(|(key, meta, value)| PortSnapshot {
            key: key.clone(),
            data_type: meta.data_type,
            default: meta.default.clone(),
            value: Some(value.clone()),
        })
        .collect()
}

fn restore_ports(listed: &[PortSnapshot], hidden: &[String], declared: PortSet) -> PortSet {
    let mut ports = if listed.is_empty() {
        declared
    } else {
        let mut ports = PortSet::new();
        for port in listed {
            ports.register(&port.key, port.data_type, port.default.clone());
            if let Some(value) = &port.value {
                ports.set(&port.key, value.clone());
            }
        }
        // declared ports missing from a hand-written list, e.g. `trigger`
        for (key, meta, value) in declared.iter() {
            if ports.register(key, meta.data_type, meta.default.clone()) {
                ports.set(key, value.clone());
            }
        }
        ports
    };
    for key in hidden {
        ports.hide(key);
    }
    ports
}
