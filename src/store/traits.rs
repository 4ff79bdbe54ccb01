// ABOUTME: Capability trait for persisting environment and branch records.
// ABOUTME: Every save replaces the whole record so readers never see half an update.

use async_trait::async_trait;

use super::error::StoreError;
use super::records::{EnvironmentRecord, IntegrationBranchRecord};
use crate::metadata::Snapshot;
use crate::types::{BranchId, EnvironmentId};

#[async_trait]
pub trait Store: Send + Sync {
    async fn load_environment(
        &self,
        id: &EnvironmentId,
    ) -> Result<Option<EnvironmentRecord>, StoreError>;

    async fn save_environment(&self, record: &EnvironmentRecord) -> Result<(), StoreError>;

    async fn load_branch(
        &self,
        id: &BranchId,
    ) -> Result<Option<IntegrationBranchRecord>, StoreError>;

    async fn save_branch(&self, record: &IntegrationBranchRecord) -> Result<(), StoreError>;

    /// Integration branches promoting into `destination`, oldest first.
    async fn list_branches(
        &self,
        destination: &EnvironmentId,
    ) -> Result<Vec<IntegrationBranchRecord>, StoreError>;

    async fn load_snapshot(&self, environment: &EnvironmentId)
    -> Result<Option<Snapshot>, StoreError>;

    async fn save_snapshot(
        &self,
        environment: &EnvironmentId,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError>;
}
