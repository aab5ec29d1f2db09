//! Git process orchestration.

pub mod driver;
pub mod errors;

pub use driver::{
    infer_commit_type, plan_branch_name, slugify, CommitOutcome, GitDriver, PrInfo, WorkflowResult,
};
pub use errors::GitError;
