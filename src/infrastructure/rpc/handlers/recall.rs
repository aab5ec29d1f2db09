//! Knowledge recall handler.

use serde_json::{json, Value};
use tracing::error;

use crate::domain::models::NodeType;
use crate::infrastructure::rpc::server::AppState;
use crate::infrastructure::rpc::types::{codes, parse_params, JsonRpcResponse, RecallRequest};

pub async fn query(state: &AppState, id: Option<Value>, params: Option<&Value>) -> JsonRpcResponse {
    let request: RecallRequest = match parse_params(params) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    if request.query.is_empty() {
        return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "query is required");
    }

    let node_type = match request.node_type.as_deref() {
        None => None,
        Some(raw) => match NodeType::from_str(raw) {
            Some(t) => Some(t),
            None => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    format!("unknown node_type: {raw}"),
                );
            }
        },
    };

    let hits = match node_type {
        Some(t) => {
            state
                .knowledge
                .search_by_type(&request.query, t, request.limit)
                .await
        }
        None => state.knowledge.search(&request.query, request.limit).await,
    };

    let hits = match hits {
        Ok(hits) => hits,
        Err(e) => {
            error!(error = %e, "recall.query failed");
            return JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string());
        }
    };

    let answer = if request.ask {
        match state.knowledge.ask(&request.query, &hits).await {
            Ok(answer) => Some(answer),
            Err(e) => {
                error!(error = %e, "recall answer synthesis failed");
                None
            }
        }
    } else {
        None
    };

    let results: Vec<Value> = hits
        .iter()
        .map(|hit| {
            json!({
                "id": hit.node.id.to_string(),
                "node_type": hit.node.node_type.as_str(),
                "summary": hit.node.summary,
                "content": hit.node.content,
                "workspace": hit.node.workspace,
                "score": hit.score,
            })
        })
        .collect();

    JsonRpcResponse::result(
        id,
        json!({
            "success": true,
            "message": format!("{} result(s)", results.len()),
            "results": results,
            "answer": answer,
        }),
    )
}
