//! Code-intelligence handlers over the symbol index.

use std::collections::HashSet;

use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use crate::domain::models::{CodeSymbol, SymbolKind};
use crate::infrastructure::rpc::server::AppState;
use crate::infrastructure::rpc::types::{
    codes, parse_params, CodeIntelCallersRequest, CodeIntelFindRequest, CodeIntelImpactRequest,
    JsonRpcResponse,
};

fn symbol_json(symbol: &CodeSymbol) -> Value {
    json!({
        "id": symbol.id.to_string(),
        "name": symbol.name,
        "kind": symbol.kind.as_str(),
        "file_path": symbol.file_path,
        "start_line": symbol.start_line,
        "end_line": symbol.end_line,
        "signature": symbol.signature,
        "visibility": symbol.visibility.as_str(),
    })
}

/// Resolve a symbol from an explicit id or a name lookup.
async fn resolve_symbol(
    state: &AppState,
    symbol_id: Option<Uuid>,
    name: Option<&str>,
) -> Result<Option<CodeSymbol>, String> {
    if let Some(symbol_id) = symbol_id {
        return state
            .knowledge_repo
            .get_symbol(symbol_id)
            .await
            .map_err(|e| e.to_string());
    }
    if let Some(name) = name {
        let mut found = state
            .knowledge_repo
            .find_symbols(name, None, 1)
            .await
            .map_err(|e| e.to_string())?;
        return Ok(found.pop());
    }
    Err("symbol_id or name is required".to_string())
}

pub async fn find(state: &AppState, id: Option<Value>, params: Option<&Value>) -> JsonRpcResponse {
    let request: CodeIntelFindRequest = match parse_params(params) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    if request.name.is_empty() {
        return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "name is required");
    }

    let kind = match request.kind.as_deref() {
        None => None,
        Some(raw) => match SymbolKind::from_str(raw) {
            Some(k) => Some(k),
            None => {
                return JsonRpcResponse::error(
                    id,
                    codes::INVALID_PARAMS,
                    format!("unknown symbol kind: {raw}"),
                );
            }
        },
    };

    match state
        .knowledge_repo
        .find_symbols(&request.name, kind, request.limit)
        .await
    {
        Ok(symbols) => JsonRpcResponse::result(
            id,
            json!({
                "success": true,
                "message": format!("{} symbol(s)", symbols.len()),
                "symbols": symbols.iter().map(symbol_json).collect::<Vec<_>>(),
            }),
        ),
        Err(e) => {
            error!(error = %e, "codeintel.find failed");
            JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string())
        }
    }
}

pub async fn callers(
    state: &AppState,
    id: Option<Value>,
    params: Option<&Value>,
) -> JsonRpcResponse {
    let request: CodeIntelCallersRequest = match parse_params(params) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    let symbol = match resolve_symbol(state, request.symbol_id, request.name.as_deref()).await {
        Ok(Some(symbol)) => symbol,
        Ok(None) => {
            return JsonRpcResponse::result(
                id,
                json!({
                    "success": false,
                    "message": "symbol not found",
                    "hint": "find candidates with codeintel.find",
                }),
            );
        }
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    match state.knowledge_repo.callers_of(symbol.id).await {
        Ok(callers) => JsonRpcResponse::result(
            id,
            json!({
                "success": true,
                "message": format!("{} caller(s) of {}", callers.len(), symbol.name),
                "symbol": symbol_json(&symbol),
                "callers": callers.iter().map(symbol_json).collect::<Vec<_>>(),
            }),
        ),
        Err(e) => {
            error!(error = %e, "codeintel.callers failed");
            JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string())
        }
    }
}

pub async fn impact(
    state: &AppState,
    id: Option<Value>,
    params: Option<&Value>,
) -> JsonRpcResponse {
    let request: CodeIntelImpactRequest = match parse_params(params) {
        Ok(r) => r,
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    let symbol = match resolve_symbol(state, request.symbol_id, request.name.as_deref()).await {
        Ok(Some(symbol)) => symbol,
        Ok(None) => {
            return JsonRpcResponse::result(
                id,
                json!({
                    "success": false,
                    "message": "symbol not found",
                    "hint": "find candidates with codeintel.find",
                }),
            );
        }
        Err(e) => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, e),
    };

    // Breadth-first walk over the caller graph, bounded by max_depth.
    let mut seen: HashSet<Uuid> = HashSet::from([symbol.id]);
    let mut frontier = vec![symbol.id];
    let mut impacted: Vec<CodeSymbol> = Vec::new();

    for _ in 0..request.max_depth {
        if frontier.is_empty() {
            break;
        }
        let mut next_frontier = Vec::new();
        for node in frontier {
            match state.knowledge_repo.callers_of(node).await {
                Ok(callers) => {
                    for caller in callers {
                        if seen.insert(caller.id) {
                            next_frontier.push(caller.id);
                            impacted.push(caller);
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "codeintel.impact failed");
                    return JsonRpcResponse::error(id, codes::INTERNAL_ERROR, e.to_string());
                }
            }
        }
        frontier = next_frontier;
    }

    JsonRpcResponse::result(
        id,
        json!({
            "success": true,
            "message": format!(
                "{} symbol(s) impacted within depth {}",
                impacted.len(),
                request.max_depth
            ),
            "symbol": symbol_json(&symbol),
            "impacted": impacted.iter().map(symbol_json).collect::<Vec<_>>(),
        }),
    )
}
