//! Task method handlers.

use serde_json::Value;
use tracing::error;

use crate::infrastructure::rpc::server::AppState;
use crate::infrastructure::rpc::types::{
    codes, parse_params, CompleteRequest, CurrentRequest, JsonRpcResponse, NextRequest,
    StartRequest,
};
use crate::services::{CompleteParams, CurrentParams, NextParams, StartParams};

fn respond<T: serde::Serialize>(id: Option<Value>, result: anyhow::Result<T>, method: &str) -> JsonRpcResponse {
    match result {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::result(id, value),
            Err(e) => JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string()),
        },
        Err(e) => {
            error!(error = %e, method, "task handler failed");
            JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string())
        }
    }
}

pub async fn next(state: &AppState, id: Option<Value>, params: Option<&Value>) -> JsonRpcResponse {
    let request: NextRequest = match parse_params(params) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    let result = state
        .task_coordinator
        .next(NextParams {
            plan_id: request.plan_id,
            session_id: request.session_id,
            auto_start: request.auto_start,
            create_branch: request.create_branch,
            skip_unpushed_check: request.skip_unpushed_check,
        })
        .await;
    respond(id, result, "task.next")
}

pub async fn current(
    state: &AppState,
    id: Option<Value>,
    params: Option<&Value>,
) -> JsonRpcResponse {
    let request: CurrentRequest = match parse_params(params) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    let result = state
        .task_coordinator
        .current(CurrentParams {
            plan_id: request.plan_id,
            session_id: request.session_id,
        })
        .await;
    respond(id, result, "task.current")
}

pub async fn start(state: &AppState, id: Option<Value>, params: Option<&Value>) -> JsonRpcResponse {
    let request: StartRequest = match parse_params(params) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    let Some(task_id) = request.task_id else {
        return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "task_id is required");
    };
    let Some(session_id) = request.session_id.filter(|s| !s.is_empty()) else {
        return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "session_id is required");
    };

    let result = state
        .task_coordinator
        .start(StartParams {
            task_id,
            session_id,
        })
        .await;
    respond(id, result, "task.start")
}

pub async fn complete(
    state: &AppState,
    id: Option<Value>,
    params: Option<&Value>,
) -> JsonRpcResponse {
    let request: CompleteRequest = match parse_params(params) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    let Some(task_id) = request.task_id else {
        return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "task_id is required");
    };

    let result = state
        .task_coordinator
        .complete(CompleteParams {
            task_id,
            summary: request.summary,
            files_modified: request.files_modified,
        })
        .await;
    respond(id, result, "task.complete")
}
