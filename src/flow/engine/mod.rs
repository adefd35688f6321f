// SPDX-License-Identifier: MIT

//! Execution engine
//!
//! A run discovers the blocks reachable from its starts, orders them with
//! Kahn's algorithm and executes them wave by wave. Blocks of one wave run
//! concurrently; their results are committed in dequeue order before the next
//! wave fetches its inputs.

pub mod executor;
pub mod inbox;
pub mod plan;
pub mod types;

pub use executor::Engine;
pub use inbox::{UiInbox, UiOutput, UiSender};
pub use plan::{discover, Dependencies, KahnOrder};
pub use types::{
    BlockResult, CyclePolicy, ExecutionReport, RunEvent, RunOptions, RunStatus, Traversal,
};
