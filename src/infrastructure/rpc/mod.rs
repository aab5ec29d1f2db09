//! Stdio JSON-RPC adapter. Thin dispatch only; business logic lives in
//! the services layer.

pub mod handlers;
pub mod server;
pub mod types;

pub use server::{dispatch, serve, AppState};
pub use types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
