//! Line-delimited JSON-RPC server over stdio.
//!
//! One line in, one line out. Each request runs in its own tokio task;
//! responses are funnelled through a single writer task so concurrent
//! requests never interleave bytes on stdout. stdout carries only the
//! protocol — all logging goes to stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::ports::KnowledgeRepository;
use crate::infrastructure::rpc::handlers;
use crate::infrastructure::rpc::types::{codes, JsonRpcRequest, JsonRpcResponse};
use crate::services::{KnowledgeService, PlanCoordinator, TaskCoordinator};

/// Shared handles the handlers dispatch into.
#[derive(Clone)]
pub struct AppState {
    pub plan_coordinator: Arc<PlanCoordinator>,
    pub task_coordinator: Arc<TaskCoordinator>,
    pub knowledge: Arc<KnowledgeService>,
    pub knowledge_repo: Arc<dyn KnowledgeRepository>,
}

/// Serve requests from stdin until EOF.
pub async fn serve(state: AppState) -> Result<()> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    let (tx, mut rx) = mpsc::channel::<String>(64);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdout.write_all(b"\n").await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    info!("rpc server listening on stdio");

    while let Some(line) = lines.next_line().await.context("stdin read failed")? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let state = state.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = handle_line(&state, &line).await;
            match serde_json::to_string(&response) {
                Ok(serialized) => {
                    if tx.send(serialized).await.is_err() {
                        warn!("response writer closed");
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialise response"),
            }
        });
    }

    drop(tx);
    let _ = writer.await;
    info!("stdin closed, rpc server shutting down");
    Ok(())
}

async fn handle_line(state: &AppState, line: &str) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            return JsonRpcResponse::error(None, codes::PARSE_ERROR, format!("parse error: {e}"));
        }
    };

    debug!(method = %request.method, "dispatching");
    dispatch(state, request).await
}

/// Route a request to its handler.
pub async fn dispatch(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();
    let params = request.params.as_ref();

    match request.method.as_str() {
        "plan.clarify" => handlers::plan::clarify(state, id, params).await,
        "plan.generate" => handlers::plan::generate(state, id, params).await,
        "plan.audit" => handlers::plan::audit(state, id, params).await,
        "task.next" => handlers::task::next(state, id, params).await,
        "task.current" => handlers::task::current(state, id, params).await,
        "task.start" => handlers::task::start(state, id, params).await,
        "task.complete" => handlers::task::complete(state, id, params).await,
        "recall.query" => handlers::recall::query(state, id, params).await,
        "codeintel.find" => handlers::codeintel::find(state, id, params).await,
        "codeintel.callers" => handlers::codeintel::callers(state, id, params).await,
        "codeintel.impact" => handlers::codeintel::impact(state, id, params).await,
        other => JsonRpcResponse::error(
            id,
            codes::METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        ),
    }
}
