// ABOUTME: Capability trait for the version-control operations the pipeline needs.
// ABOUTME: Every call names the working copy it acts on.

use async_trait::async_trait;
use std::path::Path;

use super::error::VcsError;
use crate::types::{BranchName, CommitId};

/// Checkout/merge/push as atomic operations with defined outcomes.
#[async_trait]
pub trait VcsOps: Send + Sync {
    /// Clone `remote` into `path` unless a repository already exists there.
    async fn clone_repo(&self, remote: &str, path: &Path) -> Result<(), VcsError>;

    /// Create `name` at the current HEAD. Existing branches are left alone.
    async fn create_branch(&self, path: &Path, name: &BranchName) -> Result<(), VcsError>;

    /// Check out `name` and return the commit it points at.
    async fn checkout(&self, path: &Path, name: &BranchName) -> Result<CommitId, VcsError>;

    /// Fetch `name` from upstream and fast-forward the local branch.
    /// A local branch already ahead of upstream is left as is; only
    /// divergence fails.
    async fn update_branch(&self, path: &Path, name: &BranchName) -> Result<(), VcsError>;

    /// Merge `from` into the checked-out branch and return the resulting commit.
    /// Fails with `VcsError::Conflict` without touching the working tree.
    async fn merge(&self, path: &Path, from: &BranchName) -> Result<CommitId, VcsError>;

    /// Push `name` to the remote called `remote`.
    async fn push(&self, path: &Path, remote: &str, name: &BranchName) -> Result<(), VcsError>;
}
