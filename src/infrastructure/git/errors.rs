use thiserror::Error;

/// Typed errors for git and gh invocations.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git is not installed or not on PATH")]
    GitNotInstalled,

    #[error("gh is not installed or not on PATH")]
    GhNotInstalled,

    #[error("not a git repository")]
    NotARepository,

    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("branch {branch} has unpushed commits; push or use skip_unpushed_check")]
    UnpushedCommits { branch: String },

    #[error("currently on unrelated plan branch {branch} with uncommitted changes")]
    UnrelatedBranch { branch: String },

    #[error("could not determine default branch")]
    NoDefaultBranch,

    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    #[error("git command `{command}` timed out")]
    Timeout { command: String },

    #[error("git command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
