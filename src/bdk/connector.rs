// SPDX-License-Identifier: MIT

//! Connectors between block ports
//!
//! Connectors reference blocks by identifier only. The graph container owns
//! the blocks; a connector is owned by its source block's outgoing list and
//! mirrored into the target block's input binding for direct lookup.

use crate::bdk::modifier::Modifier;
use serde_json::Value;

/// Stable block identifier
pub type BlockId = String;

/// A directed edge from one block's output port to another block's input port
#[derive(Debug, Clone, PartialEq)]
pub struct Connector {
    pub source: BlockId,
    pub source_port: String,
    pub target: BlockId,
    pub target_port: String,
    pub modifier: Option<Modifier>,
}

impl Connector {
    pub fn new(
        source: impl Into<BlockId>,
        source_port: impl Into<String>,
        target: impl Into<BlockId>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_port: source_port.into(),
            target: target.into(),
            target_port: target_port.into(),
            modifier: None,
        }
    }

    pub fn with_modifier(mut self, modifier: Option<Modifier>) -> Self {
        self.modifier = modifier;
        self
    }

    /// Same endpoints, ignoring the modifier
    pub fn matches(&self, source_port: &str, target: &str, target_port: &str) -> bool {
        self.source_port == source_port && self.target == target && self.target_port == target_port
    }

    /// Apply the modifier (if any) to a value crossing this edge
    pub fn carry(&self, value: Value) -> Value {
        match &self.modifier {
            Some(modifier) => modifier.apply(value),
            None => value,
        }
    }

    pub fn modifier_name(&self) -> Option<&str> {
        self.modifier.as_ref().map(|m| m.name())
    }
}
