//! TaskWing — AI-assisted development workflow engine.
//!
//! A local, long-lived daemon between a coding agent (JSON-RPC over
//! stdio) and a working git repository:
//! - Plan lifecycle state machine (clarify → generate → execute → audit)
//! - Task claim/completion coordination with git branch lifecycle
//! - Deviation sentinel comparing planned, reported and actual files
//! - Knowledge-grounded context retrieval with a code-symbol index

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use infrastructure::database::DatabaseConnection;
