//! Plan method handlers.

use serde_json::Value;
use tracing::error;

use crate::infrastructure::rpc::server::AppState;
use crate::infrastructure::rpc::types::{
    codes, parse_params, AuditRequest, ClarifyRequest, GenerateRequest, JsonRpcResponse,
};
use crate::services::{AuditParams, ClarifyParams, GenerateParams};

pub async fn clarify(state: &AppState, id: Option<Value>, params: Option<&Value>) -> JsonRpcResponse {
    let request: ClarifyRequest = match parse_params(params) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    if request.goal.is_empty() && request.clarify_session_id.is_none() {
        return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "goal is required");
    }

    let result = state
        .plan_coordinator
        .clarify(ClarifyParams {
            goal: request.goal,
            clarify_session_id: request.clarify_session_id,
            answers: request.answers,
            auto_answer: request.auto_answer,
        })
        .await;

    match result {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::result(id, value),
            Err(e) => JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string()),
        },
        Err(e) => {
            error!(error = %e, "plan.clarify failed");
            JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string())
        }
    }
}

pub async fn generate(
    state: &AppState,
    id: Option<Value>,
    params: Option<&Value>,
) -> JsonRpcResponse {
    let request: GenerateRequest = match parse_params(params) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    if request.goal.is_empty() {
        return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "goal is required");
    }

    let result = state
        .plan_coordinator
        .generate(GenerateParams {
            goal: request.goal,
            clarify_session_id: request.clarify_session_id,
            enriched_goal: request.enriched_goal,
            save: request.save,
        })
        .await;

    match result {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::result(id, value),
            Err(e) => JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string()),
        },
        Err(e) => {
            error!(error = %e, "plan.generate failed");
            JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string())
        }
    }
}

pub async fn audit(state: &AppState, id: Option<Value>, params: Option<&Value>) -> JsonRpcResponse {
    let request: AuditRequest = match parse_params(params) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    let result = state
        .plan_coordinator
        .audit(AuditParams {
            plan_id: request.plan_id,
            auto_fix: request.auto_fix,
        })
        .await;

    match result {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(value) => JsonRpcResponse::result(id, value),
            Err(e) => JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string()),
        },
        Err(e) => {
            error!(error = %e, "plan.audit failed");
            JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string())
        }
    }
}
