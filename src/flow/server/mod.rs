// SPDX-License-Identifier: MIT

//! HTTP surface over the engine
//!
//! Stateless: every execute request carries its own graph document.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::bdk::connector::BlockId;
use crate::bdk::error::{FlowError, Result};
use crate::flow::catalog::SchemaCatalog;
use crate::flow::engine::{Engine, ExecutionReport, RunOptions, Traversal};
use crate::flow::graph::Graph;
use crate::flow::loader::GraphLoader;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<Engine>,
    catalog: SchemaCatalog,
    loader: GraphLoader,
}

impl AppState {
    pub fn new(engine: Engine, catalog: SchemaCatalog) -> Self {
        Self {
            engine: Arc::new(engine),
            catalog,
            loader: GraphLoader::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/schemas", get(list_schemas))
        .route("/api/execute", post(execute))
        .route("/api/execute/stream", post(stream_execution))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(port: u16, state: AppState) -> Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_schemas(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.catalog.list().await))
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub graph: Value,
    /// Every block is a start when empty
    #[serde(default)]
    pub start_ids: Vec<BlockId>,
    #[serde(default)]
    pub method: Option<Traversal>,
    #[serde(default)]
    pub input_data: IndexMap<BlockId, Value>,
}

/// Build the graph and run options a request describes
fn prepare(
    loader: &GraphLoader,
    request: ExecuteRequest,
) -> Result<(Graph, Vec<BlockId>, RunOptions)> {
    let snapshot = GraphLoader::from_value(request.graph)?;
    let graph = loader.build(&snapshot)?;
    let starts = if request.start_ids.is_empty() {
        graph.ids().cloned().collect()
    } else {
        request.start_ids
    };
    let mut options = RunOptions::new().with_initial_values(request.input_data);
    options.traversal = request.method;
    Ok((graph, starts, options))
}

async fn run_request(state: &AppState, request: ExecuteRequest) -> Result<ExecutionReport> {
    let (mut graph, starts, options) = prepare(&state.loader, request)?;
    state.engine.run_with(&mut graph, &starts, options).await
}

fn status_for(err: &FlowError) -> StatusCode {
    match err {
        FlowError::Graph(_) | FlowError::Json(_) | FlowError::Yaml(_) | FlowError::Config(_) => {
            StatusCode::BAD_REQUEST
        }
        FlowError::Engine(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn execute(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteRequest>,
) -> (StatusCode, Json<Value>) {
    match run_request(&state, payload).await {
        Ok(report) => (StatusCode::OK, Json(json!(report))),
        Err(e) => {
            log::error!("Execution failed: {}", e);
            (status_for(&e), Json(json!({ "error": e.to_string() })))
        }
    }
}

async fn stream_execution(
    State(state): State<AppState>,
    Json(payload): Json<ExecuteRequest>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Event>(100);

    tokio::spawn(async move {
        let (mut graph, starts, options) = match prepare(&state.loader, payload) {
            Ok(prepared) => prepared,
            Err(e) => {
                log::warn!("Rejected streaming execution: {}", e);
                let _ = tx.send(error_event(&e)).await;
                return;
            }
        };

        let (events_tx, mut events_rx) = mpsc::channel(100);
        let forward_tx = tx.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match Event::default().json_data(&event) {
                    Ok(sse) => {
                        if forward_tx.send(sse).await.is_err() {
                            log::debug!("Stream client disconnected");
                            break;
                        }
                    }
                    Err(e) => log::error!("Failed to encode run event: {}", e),
                }
            }
        });

        log::info!("Starting streaming execution over {} start(s)", starts.len());
        let result = state
            .engine
            .run_with(&mut graph, &starts, options.with_events(events_tx))
            .await;
        // run_with dropped its sender; let the forwarder flush
        let _ = forward.await;

        match result {
            Ok(report) => match Event::default().event("report").json_data(&report) {
                Ok(sse) => {
                    let _ = tx.send(sse).await;
                }
                Err(e) => log::error!("Failed to encode report: {}", e),
            },
            Err(e) => {
                log::error!("Streaming execution failed: {}", e);
                let _ = tx.send(error_event(&e)).await;
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(Ok);

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1)))
}

fn error_event(err: &FlowError) -> Event {
    Event::default().event("error").data(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::config::EngineConfig;

    fn request(body: Value) -> ExecuteRequest {
        serde_json::from_value(body).unwrap()
    }

    fn state() -> AppState {
        let engine = Engine::from_config(EngineConfig::default()).unwrap();
        AppState::new(engine, SchemaCatalog::builtin())
    }

    #[test]
    fn test_prepare_defaults_to_every_block() {
        let (graph, starts, options) = prepare(
            &GraphLoader::new(),
            request(json!({
                "graph": {
                    "blocks": [
                        {"id": "s", "type": "START"},
                        {"id": "ui", "block_type": "REACT"}
                    ]
                },
                "method": "dfs",
                "input_data": {"ui": "World"}
            })),
        )
        .unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(starts, vec!["s".to_string(), "ui".to_string()]);
        assert_eq!(options.traversal, Some(Traversal::Dfs));
        assert_eq!(options.initial_values["ui"], json!("World"));
    }

    #[tokio::test]
    async fn test_run_request_seeds_and_reports() {
        let report = run_request(
            &state(),
            request(json!({
                "graph": {
                    "blocks": [
                        {"id": "ui", "type": "INTERACTIVE_UI"},
                        {"id": "t", "type": "TRANSFORM", "transformation_type": "uppercase"}
                    ],
                    "edges": [
                        {"source": "ui", "source_port": "onTextEntered", "target": "t"}
                    ]
                },
                "start_ids": ["ui"],
                "input_data": {"ui": "shout"}
            })),
        )
        .await
        .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.output("t", "output"), Some(&json!("SHOUT")));
    }

    #[tokio::test]
    async fn test_unknown_start_is_a_bad_request() {
        let err = run_request(
            &state(),
            request(json!({
                "graph": {"blocks": [{"id": "s", "type": "START"}]},
                "start_ids": ["ghost"]
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(status_for(&err), StatusCode::BAD_REQUEST);
    }
}
