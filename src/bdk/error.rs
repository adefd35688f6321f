// SPDX-License-Identifier: MIT

//! Typed error handling for blockflow-rs
//!
//! Mutating operations on the data model fail fast with a [`GraphError`];
//! run-level conditions surface as an [`EngineError`]. Failures inside a
//! single block's domain logic never reach these types: they are captured
//! into that block's outputs instead (see [`CallError`]).

use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, FlowError>;

/// Which side of a block a port lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// Top-level error type for blockflow-rs
#[derive(Debug, Error)]
pub enum FlowError {
    /// Errors from the block/connector data model
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Run-level errors from the execution engine
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Outbound HTTP errors outside of a block run (client construction etc.)
    #[error("HTTP error: {message}")]
    Http { message: String },

    /// Configuration errors (invalid env vars, bad files)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Errors raised synchronously by graph and port mutations.
///
/// None of these leave the graph partially modified.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphError {
    #[error("Block '{block}' has no {direction} port '{port}'")]
    UnknownPort {
        block: String,
        port: String,
        direction: PortDirection,
    },

    #[error("Block '{0}' not found")]
    UnknownBlock(String),

    #[error("Block '{0}' already exists")]
    DuplicateBlock(String),

    #[error("Block '{block}' already declares {direction} port '{port}'")]
    DuplicatePort {
        block: String,
        port: String,
        direction: PortDirection,
    },

    #[error("Input '{port}' on block '{block}' is already bound")]
    PortAlreadyBound { block: String, port: String },

    #[error("No connector from {source_block}.{source_port} to {target_block}.{target_port}")]
    ConnectorNotFound {
        source_block: String,
        source_port: String,
        target_block: String,
        target_port: String,
    },

    #[error("Ports of block '{block}' ({block_type}) are fixed by its type")]
    PortsNotEditable { block: String, block_type: String },

    #[error("Unknown modifier '{0}'")]
    UnknownModifier(String),
}

/// Run-level engine errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// Some reachable blocks never reached zero in-degree
    #[error("Cycle detected, unresolved blocks: {unresolved:?}")]
    CycleDetected { unresolved: Vec<String> },

    /// The run was cancelled through its cancellation token
    #[error("Run cancelled")]
    Cancelled,
}

/// Failure of an API block's outbound call.
///
/// Captured into the block's `error` output; never aborts a run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CallError {
    #[error("Request failed: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out after {0}ms")]
    Timeout(u64),
}

impl FlowError {
    /// Create an HTTP error
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl GraphError {
    pub fn unknown_input(block: impl Into<String>, port: impl Into<String>) -> Self {
        Self::UnknownPort {
            block: block.into(),
            port: port.into(),
            direction: PortDirection::Input,
        }
    }

    pub fn unknown_output(block: impl Into<String>, port: impl Into<String>) -> Self {
        Self::UnknownPort {
            block: block.into(),
            port: port.into(),
            direction: PortDirection::Output,
        }
    }

    pub fn unknown_block(id: impl Into<String>) -> Self {
        Self::UnknownBlock(id.into())
    }
}

impl From<&str> for FlowError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for FlowError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_port_message() {
        let err = GraphError::unknown_input("logic-1", "val_c");
        assert_eq!(err.to_string(), "Block 'logic-1' has no input port 'val_c'");

        let err = GraphError::unknown_output("api-1", "missing");
        assert!(err.to_string().contains("output port 'missing'"));
    }

    #[test]
    fn test_graph_error_wraps_into_flow_error() {
        let err: FlowError = GraphError::unknown_block("gone").into();
        assert!(matches!(err, FlowError::Graph(GraphError::UnknownBlock(_))));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_cycle_error_lists_blocks() {
        let err = EngineError::CycleDetected {
            unresolved: vec!["a".to_string(), "b".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("\"a\""));
        assert!(text.contains("\"b\""));
    }

    #[test]
    fn test_call_error_status() {
        let err = CallError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: unavailable");
    }

    #[test]
    fn test_flow_error_from_str() {
        let err: FlowError = "Something went wrong".into();
        assert_eq!(err.to_string(), "Something went wrong");
    }
}
