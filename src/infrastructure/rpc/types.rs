//! JSON-RPC 2.0 wire types and request payloads.
//!
//! Payload fields are `snake_case`; unknown keys are permitted. The one
//! exception is the legacy camelCase `planId` key, which is rejected
//! outright — the parser names both spellings so callers can migrate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::models::ClarifyAnswer;

/// Incoming JSON-RPC request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Outgoing JSON-RPC response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// Standard JSON-RPC error codes used by the dispatcher.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Reject the legacy camelCase `planId` key. Schema contract: there is
/// no tolerant mode.
pub fn reject_legacy_keys(params: &Value) -> Result<(), String> {
    if let Some(object) = params.as_object() {
        if object.contains_key("planId") {
            return Err(
                "legacy key \"planId\" is not accepted; use \"plan_id\" instead".to_string(),
            );
        }
    }
    Ok(())
}

/// Parse a request's params into a typed payload, enforcing the legacy
/// key rejection first. Absent params parse as the payload's default.
pub fn parse_params<T: serde::de::DeserializeOwned + Default>(
    params: Option<&Value>,
) -> Result<T, String> {
    match params {
        None => Ok(T::default()),
        Some(value) => {
            reject_legacy_keys(value)?;
            serde_json::from_value(value.clone()).map_err(|e| format!("invalid params: {e}"))
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_limit() -> usize {
    10
}

const fn default_depth() -> usize {
    3
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ClarifyRequest {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub clarify_session_id: Option<Uuid>,
    #[serde(default)]
    pub answers: Vec<ClarifyAnswer>,
    #[serde(default)]
    pub auto_answer: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub clarify_session_id: Option<Uuid>,
    #[serde(default)]
    pub enriched_goal: Option<String>,
    #[serde(default = "default_true")]
    pub save: bool,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            goal: String::new(),
            clarify_session_id: None,
            enriched_goal: None,
            save: true,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuditRequest {
    #[serde(default)]
    pub plan_id: Option<Uuid>,
    #[serde(default)]
    pub auto_fix: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextRequest {
    #[serde(default)]
    pub plan_id: Option<Uuid>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_true")]
    pub create_branch: bool,
    #[serde(default)]
    pub skip_unpushed_check: bool,
}

impl Default for NextRequest {
    fn default() -> Self {
        Self {
            plan_id: None,
            session_id: None,
            auto_start: false,
            create_branch: true,
            skip_unpushed_check: false,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CurrentRequest {
    #[serde(default)]
    pub plan_id: Option<Uuid>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CompleteRequest {
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub files_modified: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecallRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub ask: bool,
}

impl Default for RecallRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            node_type: None,
            limit: default_limit(),
            ask: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeIntelFindRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for CodeIntelFindRequest {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: None,
            limit: default_limit(),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CodeIntelCallersRequest {
    #[serde(default)]
    pub symbol_id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeIntelImpactRequest {
    #[serde(default)]
    pub symbol_id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_depth")]
    pub max_depth: usize,
}

impl Default for CodeIntelImpactRequest {
    fn default() -> Self {
        Self {
            symbol_id: None,
            name: None,
            max_depth: default_depth(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_plan_id_key_is_rejected() {
        let params = json!({"planId": "abc"});
        let err = reject_legacy_keys(&params).unwrap_err();
        assert!(err.contains("planId"));
        assert!(err.contains("plan_id"));
    }

    #[test]
    fn snake_case_plan_id_is_accepted() {
        let id = Uuid::new_v4();
        let params = json!({"plan_id": id.to_string()});
        let parsed: AuditRequest = parse_params(Some(&params)).expect("should parse");
        assert_eq!(parsed.plan_id, Some(id));
    }

    #[test]
    fn unknown_keys_are_permitted() {
        let params = json!({"goal": "g", "totally_unknown": 42});
        let parsed: ClarifyRequest = parse_params(Some(&params)).expect("should parse");
        assert_eq!(parsed.goal, "g");
    }

    #[test]
    fn missing_params_default() {
        let parsed: NextRequest = parse_params(None).expect("should parse");
        assert!(parsed.create_branch);
        assert!(!parsed.auto_start);
    }

    #[test]
    fn rejection_applies_to_every_method_payload() {
        let params = json!({"planId": "abc", "session_id": "s"});
        assert!(parse_params::<NextRequest>(Some(&params)).is_err());
        assert!(parse_params::<GenerateRequest>(Some(&params)).is_err());
    }
}
