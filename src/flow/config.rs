// SPDX-License-Identifier: MIT

//! Engine configuration

use crate::flow::engine::{CyclePolicy, Traversal};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Blocks of one wave executing at the same time. 1 runs sequentially.
    pub max_concurrent_blocks: usize,
    /// Upper bound on one block's `execute`
    pub block_timeout_ms: u64,
    /// Timeout of the outbound HTTP client used by API blocks
    pub http_timeout_ms: u64,
    /// How long a block waits for an InteractiveUI value before proceeding
    pub ui_wait_timeout_ms: u64,
    pub ui_inbox_capacity: usize,
    pub traversal: Traversal,
    pub cycle_policy: CyclePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_blocks: 4,
            block_timeout_ms: 30_000,
            http_timeout_ms: 10_000,
            ui_wait_timeout_ms: 5_000,
            ui_inbox_capacity: 64,
            traversal: Traversal::Bfs,
            cycle_policy: CyclePolicy::Partial,
        }
    }
}

fn env_or<T: FromStr>(key: &str, fallback: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid value '{}' for {}", raw, key);
            fallback
        }),
        Err(_) => fallback,
    }
}

impl EngineConfig {
    /// Read configuration from environment variables.
    ///
    /// - `BLOCKFLOW_MAX_CONCURRENT_BLOCKS`
    /// - `BLOCKFLOW_BLOCK_TIMEOUT_MS`
    /// - `BLOCKFLOW_HTTP_TIMEOUT_MS`
    /// - `BLOCKFLOW_UI_WAIT_MS`
    /// - `BLOCKFLOW_UI_INBOX_CAPACITY`
    /// - `BLOCKFLOW_TRAVERSAL` (`bfs` or `dfs`)
    /// - `BLOCKFLOW_CYCLE_POLICY` (`partial` or `strict`)
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_blocks: env_or(
                "BLOCKFLOW_MAX_CONCURRENT_BLOCKS",
                defaults.max_concurrent_blocks,
            )
            .max(1),
            block_timeout_ms: env_or("BLOCKFLOW_BLOCK_TIMEOUT_MS", defaults.block_timeout_ms),
            http_timeout_ms: env_or("BLOCKFLOW_HTTP_TIMEOUT_MS", defaults.http_timeout_ms),
            ui_wait_timeout_ms: env_or("BLOCKFLOW_UI_WAIT_MS", defaults.ui_wait_timeout_ms),
            ui_inbox_capacity: env_or("BLOCKFLOW_UI_INBOX_CAPACITY", defaults.ui_inbox_capacity)
                .max(1),
            traversal: env_or("BLOCKFLOW_TRAVERSAL", defaults.traversal),
            cycle_policy: env_or("BLOCKFLOW_CYCLE_POLICY", defaults.cycle_policy),
        }
    }

    pub fn with_max_concurrent_blocks(mut self, max: usize) -> Self {
        self.max_concurrent_blocks = max.max(1);
        self
    }

    pub fn with_block_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.block_timeout_ms = timeout_ms;
        self
    }

    pub fn with_http_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.http_timeout_ms = timeout_ms;
        self
    }

    pub fn with_ui_wait_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.ui_wait_timeout_ms = timeout_ms;
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn with_cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }
}
