// SPDX-License-Identifier: MIT

//! Graph run executor

use super::inbox::{UiInbox, UiOutput};
use super::plan::{discover, Dependencies};
use super::types::{
    BlockResult, CyclePolicy, ExecutionReport, RunEvent, RunOptions, RunStatus,
};
use crate::bdk::connector::BlockId;
use crate::bdk::error::{EngineError, Result};
use crate::bdk::http::{HttpClient, ReqwestClient};
use crate::flow::blocks::interactive::ON_TEXT_ENTERED;
use crate::flow::blocks::{BlockContext, BlockKind, BlockOutcome, BlockType};
use crate::flow::config::EngineConfig;
use crate::flow::graph::Graph;
use chrono::Utc;
use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Output ports that have received a value from the UI surface this run
type Delivered = HashSet<(BlockId, String)>;

/// One block of a wave, detached from the graph while it executes
struct Job {
    id: BlockId,
    name: String,
    block_type: BlockType,
    kind: BlockKind,
    inputs: IndexMap<String, Value>,
}

/// Runs graphs: discovery, Kahn ordering, wave-parallel execution
pub struct Engine {
    config: EngineConfig,
    http: Arc<dyn HttpClient>,
}

impl Engine {
    pub fn new(config: EngineConfig, http: Arc<dyn HttpClient>) -> Self {
        Self { config, http }
    }

    /// Engine backed by a reqwest client using `http_timeout_ms`
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let http = ReqwestClient::new(config.http_timeout_ms)?;
        Ok(Self::new(config, Arc::new(http)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn run(&self, graph: &mut Graph, starts: &[BlockId]) -> Result<ExecutionReport> {
        self.run_with(graph, starts, RunOptions::default()).await
    }

    /// Run with every block as a start
    pub async fn run_all(&self, graph: &mut Graph) -> Result<ExecutionReport> {
        let starts: Vec<BlockId> = graph.ids().cloned().collect();
        self.run(graph, &starts).await
    }

    pub async fn run_with(
        &self,
        graph: &mut Graph,
        starts: &[BlockId],
        mut options: RunOptions,
    ) -> Result<ExecutionReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let traversal = options.traversal.unwrap_or(self.config.traversal);

        let reachable = discover(graph, starts, traversal)?;
        let deps = Dependencies::build(graph, &reachable);
        log::info!(
            "Run {} on graph '{}': {} start(s), {} reachable block(s), {} traversal",
            run_id,
            graph.name,
            starts.len(),
            reachable.len(),
            traversal
        );

        if self.config.cycle_policy == CyclePolicy::Strict {
            let dry = deps.kahn_order();
            if !dry.unresolved.is_empty() {
                log::error!(
                    "Cycle detected in run {}, refusing to execute; unresolved: {:?}",
                    run_id,
                    dry.unresolved
                );
                return Err(EngineError::CycleDetected {
                    unresolved: dry.unresolved,
                }
                .into());
            }
        }

        // seeding is the first write; everything that can reject the run is above
        let mut delivered: Delivered = HashSet::new();
        for id in graph.seed(&options.initial_values)? {
            delivered.insert((id, ON_TEXT_ENTERED.to_string()));
        }

        let mut in_degree = deps.in_degrees();
        let mut ready = deps.initial_ready();
        let mut executed: Vec<BlockId> = Vec::with_capacity(reachable.len());
        let mut execution_order: Vec<String> = Vec::with_capacity(reachable.len());
        let mut block_results: IndexMap<BlockId, BlockResult> = IndexMap::new();
        let mut cancelled = false;

        let semaphore = Semaphore::new(self.config.max_concurrent_blocks.max(1));
        let ctx = BlockContext::new(self.http.clone());
        let block_timeout = Duration::from_millis(self.config.block_timeout_ms);
        let cancel = options.cancel.clone();
        let mut wave_no = 0;

        while !ready.is_empty() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            wave_no += 1;

            if let Some(inbox) = options.inbox.as_mut() {
                for output in inbox.drain() {
                    deliver(graph, &mut delivered, output);
                }
            }

            let wave: Vec<BlockId> = ready.drain(..).collect();
            log::debug!("Run {} wave {}: {:?}", run_id, wave_no, wave);

            let mut jobs = Vec::with_capacity(wave.len());
            for id in &wave {
                if let Some(inbox) = options.inbox.as_mut() {
                    self.await_ui_values(graph, id, inbox, &mut delivered, &cancel)
                        .await?;
                }
                graph.fetch_inputs(id)?;
                let block = graph.get(id)?;
                jobs.push(Job {
                    id: id.clone(),
                    name: block.name.clone(),
                    block_type: block.block_type(),
                    kind: block.kind().clone(),
                    inputs: block.inputs().values().clone(),
                });
            }

            for job in &jobs {
                log::info!("Executing block '{}' ({}) [{}]", job.name, job.block_type, job.id);
                emit(
                    &options.events,
                    RunEvent::BlockStarted {
                        run_id: run_id.clone(),
                        block_id: job.id.clone(),
                        name: job.name.clone(),
                    },
                )
                .await;
            }

            let running = jobs.iter().map(|job| {
                let semaphore = &semaphore;
                let ctx = &ctx;
                async move {
                    let started = std::time::Instant::now();
                    // Err: the block produced no outcome at all
                    let outcome = match semaphore.acquire().await {
                        Ok(_permit) => {
                            match tokio::time::timeout(block_timeout, job.kind.execute(&job.inputs, ctx))
                                .await
                            {
                                Ok(outcome) => Ok(outcome),
                                Err(_) => {
                                    log::warn!(
                                        "Block '{}' [{}] timed out after {} ms",
                                        job.name,
                                        job.id,
                                        block_timeout.as_millis()
                                    );
                                    Err(format!("timed out after {} ms", block_timeout.as_millis()))
                                }
                            }
                        }
                        Err(_) => Err("block scheduler closed".to_string()),
                    };
                    (outcome, started.elapsed().as_millis() as u64)
                }
            });

            let finished = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                results = join_all(running) => Some(results),
            };
            let Some(results) = finished else {
                log::warn!("Run {} cancelled during wave {}", run_id, wave_no);
                cancelled = true;
                break;
            };

            // commit in dequeue order so downstream readiness matches FIFO Kahn
            for (job, (outcome, duration_ms)) in jobs.into_iter().zip(results) {
                let block = graph.get_mut(&job.id)?;
                let outcome = outcome.unwrap_or_else(|message| {
                    BlockOutcome::failed(block.failure_outputs(&message), message)
                });
                block.apply_outputs(outcome.outputs);
                let outputs = block.outputs().values().clone();

                match &outcome.error {
                    Some(err) => log::warn!("Block '{}' [{}] failed: {}", job.name, job.id, err),
                    None => log::info!(
                        "Block '{}' [{}] finished in {} ms",
                        job.name,
                        job.id,
                        duration_ms
                    ),
                }
                emit(
                    &options.events,
                    RunEvent::BlockFinished {
                        run_id: run_id.clone(),
                        block_id: job.id.clone(),
                        name: job.name.clone(),
                        error: outcome.error.clone(),
                    },
                )
                .await;

                for next in deps.successors(&job.id) {
                    if let Some(degree) = in_degree.get_mut(next) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push_back(next.clone());
                        }
                    }
                }

                execution_order.push(job.name.clone());
                block_results.insert(
                    job.id.clone(),
                    BlockResult {
                        name: job.name,
                        block_type: job.block_type,
                        outputs,
                        error: outcome.error,
                        duration_ms,
                    },
                );
                executed.push(job.id);
            }
        }

        let done: HashSet<&BlockId> = executed.iter().collect();
        let remaining: Vec<BlockId> = reachable
            .iter()
            .filter(|id| !done.contains(id))
            .cloned()
            .collect();

        let status = if cancelled {
            RunStatus::Cancelled { pending: remaining }
        } else if !remaining.is_empty() {
            log::error!(
                "Cycle detected in run {}: {} block(s) never became ready: {:?}",
                run_id,
                remaining.len(),
                remaining
            );
            RunStatus::Blocked {
                unresolved: remaining,
            }
        } else {
            RunStatus::Completed
        };

        log::info!(
            "Run {} finished: {} of {} block(s) executed ({:?})",
            run_id,
            executed.len(),
            reachable.len(),
            status
        );
        emit(
            &options.events,
            RunEvent::RunFinished {
                run_id: run_id.clone(),
                status: status.clone(),
            },
        )
        .await;

        Ok(ExecutionReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            execution_order,
            executed,
            block_results,
            status,
        })
    }

    /// Wait for InteractiveUI outputs feeding `id` that have not been
    /// delivered yet. Gives up at the deadline and keeps the current values.
    async fn await_ui_values(
        &self,
        graph: &mut Graph,
        id: &str,
        inbox: &mut UiInbox,
        delivered: &mut Delivered,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let block = graph.get(id)?;
        let awaited: Vec<(BlockId, String)> = block
            .incoming()
            .filter(|c| {
                graph
                    .block(&c.source)
                    .is_some_and(|source| source.block_type() == BlockType::InteractiveUi)
            })
            .map(|c| (c.source.clone(), c.source_port.clone()))
            .filter(|key| !delivered.contains(key))
            .collect();
        if awaited.is_empty() {
            return Ok(());
        }

        let deadline = Instant::now() + Duration::from_millis(self.config.ui_wait_timeout_ms);
        for key in awaited {
            while !delivered.contains(&key) {
                let remaining = deadline.saturating_duration_since(Instant::now());
                let received = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(()),
                    received = inbox.recv_timeout(remaining) => received,
                };
                match received {
                    Some(output) => deliver(graph, delivered, output),
                    None => {
                        log::warn!(
                            "No UI value for {}.{} within {} ms; block {} uses the current value",
                            key.0,
                            key.1,
                            self.config.ui_wait_timeout_ms,
                            id
                        );
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Apply one UI deposit to the graph
fn deliver(graph: &mut Graph, delivered: &mut Delivered, output: UiOutput) {
    match graph.report_output(&output.block_id, &output.port, output.value) {
        Ok(()) => {
            log::debug!("UI value delivered to {}.{}", output.block_id, output.port);
            delivered.insert((output.block_id, output.port));
        }
        Err(e) => log::warn!("Discarding UI value: {}", e),
    }
}

async fn emit(events: &Option<mpsc::Sender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        if tx.send(event).await.is_err() {
            log::debug!("Run event receiver dropped");
        }
    }
}
