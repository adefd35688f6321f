// SPDX-License-Identifier: MIT

//! Run options, events and the execution report

use super::inbox::UiInbox;
use crate::bdk::connector::BlockId;
use crate::bdk::error::EngineError;
use crate::flow::blocks::BlockType;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Order in which discovery walks outgoing connectors.
///
/// Only affects bookkeeping; execution order is fixed by dependencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Traversal {
    #[default]
    Bfs,
    Dfs,
}

impl FromStr for Traversal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bfs" => Ok(Traversal::Bfs),
            "dfs" => Ok(Traversal::Dfs),
            other => Err(format!("unknown traversal '{}', expected bfs or dfs", other)),
        }
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Traversal::Bfs => write!(f, "bfs"),
            Traversal::Dfs => write!(f, "dfs"),
        }
    }
}

/// What happens when the reachable subgraph contains a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Run every block that can run and report the rest as unresolved
    #[default]
    Partial,
    /// Refuse to run with `CycleDetected`
    Strict,
}

impl FromStr for CyclePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "partial" => Ok(CyclePolicy::Partial),
            "strict" => Ok(CyclePolicy::Strict),
            other => Err(format!(
                "unknown cycle policy '{}', expected partial or strict",
                other
            )),
        }
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Reachable blocks that never reached in-degree zero
    Blocked { unresolved: Vec<BlockId> },
    /// Reachable blocks that had not executed when the run was cancelled
    Cancelled { pending: Vec<BlockId> },
}

/// Outcome of one executed block
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlockResult {
    pub name: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub outputs: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExecutionReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Block names in execution order
    pub execution_order: Vec<String>,
    /// Block ids in execution order
    pub executed: Vec<BlockId>,
    pub block_results: IndexMap<BlockId, BlockResult>,
    pub status: RunStatus,
}

impl ExecutionReport {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Blocks left out by a cycle; empty unless blocked
    pub fn unresolved(&self) -> &[BlockId] {
        match &self.status {
            RunStatus::Blocked { unresolved } => unresolved,
            _ => &[],
        }
    }

    pub fn result(&self, id: &str) -> Option<&BlockResult> {
        self.block_results.get(id)
    }

    pub fn output(&self, id: &str, port: &str) -> Option<&Value> {
        self.block_results.get(id).and_then(|r| r.outputs.get(port))
    }

    /// Turn a blocked or cancelled report into the matching error
    pub fn ensure_complete(self) -> Result<Self, EngineError> {
        let err = match &self.status {
            RunStatus::Completed => None,
            RunStatus::Blocked { unresolved } => Some(EngineError::CycleDetected {
                unresolved: unresolved.clone(),
            }),
            RunStatus::Cancelled { .. } => Some(EngineError::Cancelled),
        };
        match err {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Progress notifications emitted during a run
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    BlockStarted {
        run_id: String,
        block_id: BlockId,
        name: String,
    },
    BlockFinished {
        run_id: String,
        block_id: BlockId,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
    },
}

/// Per-run knobs on top of [`EngineConfig`](crate::flow::config::EngineConfig)
#[derive(Default)]
pub struct RunOptions {
    /// Overrides the configured traversal
    pub traversal: Option<Traversal>,
    pub cancel: CancellationToken,
    pub inbox: Option<UiInbox>,
    pub events: Option<mpsc::Sender<RunEvent>>,
    /// Values seeded into InteractiveUI outputs, keyed by block id
    pub initial_values: IndexMap<BlockId, Value>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = Some(traversal);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_inbox(mut self, inbox: UiInbox) -> Self {
        self.inbox = Some(inbox);
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_initial_values(mut self, values: IndexMap<BlockId, Value>) -> Self {
        self.initial_values = values;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(status: RunStatus) -> ExecutionReport {
        ExecutionReport {
            run_id: "r1".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            execution_order: vec![],
            executed: vec![],
            block_results: IndexMap::new(),
            status,
        }
    }

    #[test]
    fn test_parse_traversal_and_policy() {
        assert_eq!("DFS".parse::<Traversal>().unwrap(), Traversal::Dfs);
        assert!("sideways".parse::<Traversal>().is_err());
        assert_eq!("strict".parse::<CyclePolicy>().unwrap(), CyclePolicy::Strict);
        assert!("lenient".parse::<CyclePolicy>().is_err());
    }

    #[test]
    fn test_ensure_complete() {
        assert!(report(RunStatus::Completed).ensure_complete().is_ok());

        let blocked = report(RunStatus::Blocked {
            unresolved: vec!["a".to_string()],
        });
        assert_eq!(blocked.unresolved(), &["a".to_string()][..]);
        assert_eq!(
            blocked.ensure_complete().unwrap_err(),
            EngineError::CycleDetected {
                unresolved: vec!["a".to_string()]
            }
        );

        let cancelled = report(RunStatus::Cancelled { pending: vec![] });
        assert_eq!(cancelled.ensure_complete().unwrap_err(), EngineError::Cancelled);
    }

    #[test]
    fn test_status_serialization() {
        let value = serde_json::to_value(RunStatus::Blocked {
            unresolved: vec!["x".to_string()],
        })
        .unwrap();
        assert_eq!(value, json!({"state": "blocked", "unresolved": ["x"]}));

        let event = RunEvent::RunFinished {
            run_id: "r".to_string(),
            status: RunStatus::Completed,
        };
        assert_eq!(
            serde_json::to_value(event).unwrap(),
            json!({"event": "run_finished", "run_id": "r", "status": {"state": "completed"}})
        );
    }
}
