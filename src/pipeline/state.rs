// ABOUTME: Integration branch state markers for the type state pattern.
// ABOUTME: Markers carry the data each state guarantees to exist.

use chrono::{DateTime, Utc};
use std::fmt;

use crate::types::CommitId;

/// Branch materialized in the working copy; nothing merged yet.
/// Available actions: `integrate()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Created;

/// Source merged in; the merge commit is recorded.
/// Available actions: `deploy()`
#[derive(Debug, Clone)]
pub struct Integrated {
    pub(crate) post_merge: CommitId,
}

impl Integrated {
    pub fn post_merge_commit_id(&self) -> &CommitId {
        &self.post_merge
    }
}

/// Deployed to the destination and merged back. Terminal.
#[derive(Debug, Clone)]
pub struct Deployed {
    pub(crate) deployed_at: DateTime<Utc>,
}

impl Deployed {
    pub fn deployed_at(&self) -> DateTime<Utc> {
        self.deployed_at
    }
}

/// Runtime view of a branch's position in the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Created,
    Integrated,
    Deployed,
}

impl fmt::Display for BranchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchState::Created => f.write_str("created"),
            BranchState::Integrated => f.write_str("integrated"),
            BranchState::Deployed => f.write_str("deployed"),
        }
    }
}
