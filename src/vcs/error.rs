// ABOUTME: Error types for version-control operations.
// ABOUTME: Merge conflicts are a distinct variant so callers never parse messages.

use std::path::PathBuf;

/// Errors from VCS operations on a working copy.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Path is not a repository and could not be cloned into.
    #[error("not a repository: {0}")]
    NotARepo(PathBuf),

    /// Requested branch or ref does not exist.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// Merge produced conflicts; nothing was committed.
    #[error("merge conflict in {} path(s): {}", paths.len(), paths.join(", "))]
    Conflict { paths: Vec<String> },

    /// Local branch has diverged from its upstream and cannot fast-forward.
    #[error("{branch} cannot be fast-forwarded to its upstream")]
    Diverged { branch: String },

    /// Remote refused a pushed ref.
    #[error("push of {refname} rejected: {message}")]
    PushRejected { refname: String, message: String },

    /// Any other git failure.
    #[error("git error: {0}")]
    Git(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<git2::Error> for VcsError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => VcsError::RefNotFound(err.message().to_string()),
            git2::ErrorCode::MergeConflict => VcsError::Conflict {
                paths: vec![err.message().to_string()],
            },
            _ => VcsError::Git(err.message().to_string()),
        }
    }
}

impl VcsError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, VcsError::Conflict { .. })
    }
}
