// ABOUTME: Integration branch parameterized by its lifecycle state.
// ABOUTME: Also the runtime-tagged form used when loading branches from the store.

use std::path::Path;

use super::error::PipelineError;
use super::state::{BranchState, Created, Deployed, Integrated};
use crate::store::{IntegrationBranchRecord, Store};
use crate::types::{BranchId, BranchName, CommitId, EnvironmentId};

/// A promotion unit from one environment into another.
///
/// The state parameter decides which transitions exist: `integrate` only on
/// `Created`, `deploy` only on `Integrated`, nothing on `Deployed`.
#[derive(Debug)]
pub struct IntegrationBranch<S> {
    pub(crate) record: IntegrationBranchRecord,
    pub(crate) state: S,
}

impl<S> IntegrationBranch<S> {
    pub fn id(&self) -> &BranchId {
        &self.record.id
    }

    pub fn name(&self) -> &BranchName {
        &self.record.name
    }

    pub fn local_path(&self) -> &Path {
        &self.record.local_path
    }

    pub fn source_env(&self) -> &EnvironmentId {
        &self.record.source_env
    }

    pub fn dest_env(&self) -> &EnvironmentId {
        &self.record.dest_env
    }

    pub fn pre_merge_commit_id(&self) -> Option<&CommitId> {
        self.record.pre_merge_commit_id.as_ref()
    }

    pub fn record(&self) -> &IntegrationBranchRecord {
        &self.record
    }

    pub fn state_data(&self) -> &S {
        &self.state
    }
}

impl IntegrationBranch<Created> {
    pub fn post_merge_commit_id(&self) -> Option<&CommitId> {
        None
    }
}

impl IntegrationBranch<Integrated> {
    pub fn post_merge_commit_id(&self) -> &CommitId {
        self.state.post_merge_commit_id()
    }
}

impl IntegrationBranch<Deployed> {
    pub fn post_merge_commit_id(&self) -> Option<&CommitId> {
        self.record.post_merge_commit_id.as_ref()
    }
}

/// An integration branch whose state is only known at runtime.
#[derive(Debug)]
pub enum AnyIntegrationBranch {
    Created(IntegrationBranch<Created>),
    Integrated(IntegrationBranch<Integrated>),
    Deployed(IntegrationBranch<Deployed>),
}

impl AnyIntegrationBranch {
    /// Derive the state from persisted fields: deployed wins, then a
    /// recorded merge commit, else freshly created.
    pub fn from_record(record: IntegrationBranchRecord) -> Self {
        if record.is_deployed {
            let deployed_at = record.deployed_at.unwrap_or(record.created_at);
            return AnyIntegrationBranch::Deployed(IntegrationBranch {
                record,
                state: Deployed { deployed_at },
            });
        }
        match record.post_merge_commit_id.clone() {
            Some(post_merge) => AnyIntegrationBranch::Integrated(IntegrationBranch {
                record,
                state: Integrated { post_merge },
            }),
            None => AnyIntegrationBranch::Created(IntegrationBranch {
                record,
                state: Created,
            }),
        }
    }

    pub async fn load(store: &dyn Store, id: &BranchId) -> Result<Self, PipelineError> {
        let record = store
            .load_branch(id)
            .await
            .map_err(|source| PipelineError::Persistence {
                what: format!("branch {}", id),
                source,
            })?
            .ok_or_else(|| PipelineError::BranchNotFound {
                branch: id.to_string(),
            })?;
        Ok(Self::from_record(record))
    }

    pub fn state(&self) -> BranchState {
        match self {
            AnyIntegrationBranch::Created(_) => BranchState::Created,
            AnyIntegrationBranch::Integrated(_) => BranchState::Integrated,
            AnyIntegrationBranch::Deployed(_) => BranchState::Deployed,
        }
    }

    pub fn record(&self) -> &IntegrationBranchRecord {
        match self {
            AnyIntegrationBranch::Created(b) => b.record(),
            AnyIntegrationBranch::Integrated(b) => b.record(),
            AnyIntegrationBranch::Deployed(b) => b.record(),
        }
    }

    pub fn into_created(self) -> Result<IntegrationBranch<Created>, PipelineError> {
        match self {
            AnyIntegrationBranch::Created(b) => Ok(b),
            other => Err(other.wrong_state(BranchState::Created)),
        }
    }

    pub fn into_integrated(self) -> Result<IntegrationBranch<Integrated>, PipelineError> {
        match self {
            AnyIntegrationBranch::Integrated(b) => Ok(b),
            other => Err(other.wrong_state(BranchState::Integrated)),
        }
    }

    pub fn into_deployed(self) -> Result<IntegrationBranch<Deployed>, PipelineError> {
        match self {
            AnyIntegrationBranch::Deployed(b) => Ok(b),
            other => Err(other.wrong_state(BranchState::Deployed)),
        }
    }

    fn wrong_state(&self, expected: BranchState) -> PipelineError {
        PipelineError::InvalidState {
            branch: self.record().name.to_string(),
            expected,
            actual: self.state(),
        }
    }
}

impl From<IntegrationBranch<Created>> for AnyIntegrationBranch {
    fn from(branch: IntegrationBranch<Created>) -> Self {
        AnyIntegrationBranch::Created(branch)
    }
}

impl From<IntegrationBranch<Integrated>> for AnyIntegrationBranch {
    fn from(branch: IntegrationBranch<Integrated>) -> Self {
        AnyIntegrationBranch::Integrated(branch)
    }
}

impl From<IntegrationBranch<Deployed>> for AnyIntegrationBranch {
    fn from(branch: IntegrationBranch<Deployed>) -> Self {
        AnyIntegrationBranch::Deployed(branch)
    }
}
