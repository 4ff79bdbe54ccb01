// ABOUTME: Persisted record shapes for environments and integration branches.
// ABOUTME: Plain serde structs; all behavior lives in the aggregates that own them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{BranchId, BranchName, CommitId, EnvironmentId, EnvironmentName};

/// A branch together with the working copy it is checked out in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    pub name: BranchName,
    pub local_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub id: EnvironmentId,
    pub name: EnvironmentName,
    /// Mainline branch the environment's deployed state tracks.
    pub branch: BranchRef,
    /// Remote that merge-backs are pushed to.
    pub push_remote: String,
    pub host: String,
    /// The single integration branch currently promoting into this environment.
    #[serde(default)]
    pub active_branch: Option<BranchId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationBranchRecord {
    pub id: BranchId,
    pub name: BranchName,
    pub local_path: PathBuf,
    pub source_env: EnvironmentId,
    pub dest_env: EnvironmentId,
    #[serde(default)]
    pub pre_merge_commit_id: Option<CommitId>,
    #[serde(default)]
    pub post_merge_commit_id: Option<CommitId>,
    #[serde(default)]
    pub is_deployed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deployed_at: Option<DateTime<Utc>>,
}

impl IntegrationBranchRecord {
    pub fn new(
        name: BranchName,
        local_path: PathBuf,
        source_env: EnvironmentId,
        dest_env: EnvironmentId,
    ) -> Self {
        Self {
            id: BranchId::new(name.as_str()),
            name,
            local_path,
            source_env,
            dest_env,
            pre_merge_commit_id: None,
            post_merge_commit_id: None,
            is_deployed: false,
            created_at: Utc::now(),
            deployed_at: None,
        }
    }
}
