// ABOUTME: In-process store backed by hash maps.
// ABOUTME: Used when embedding the pipeline without a state directory, and in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::error::StoreError;
use super::records::{EnvironmentRecord, IntegrationBranchRecord};
use super::traits::Store;
use crate::metadata::Snapshot;
use crate::types::{BranchId, EnvironmentId};

#[derive(Debug, Default)]
pub struct MemoryStore {
    environments: Mutex<HashMap<EnvironmentId, EnvironmentRecord>>,
    branches: Mutex<HashMap<BranchId, IntegrationBranchRecord>>,
    snapshots: Mutex<HashMap<EnvironmentId, Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_environment(
        &self,
        id: &EnvironmentId,
    ) -> Result<Option<EnvironmentRecord>, StoreError> {
        Ok(self.environments.lock().get(id).cloned())
    }

    async fn save_environment(&self, record: &EnvironmentRecord) -> Result<(), StoreError> {
        self.environments
            .lock()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn load_branch(
        &self,
        id: &BranchId,
    ) -> Result<Option<IntegrationBranchRecord>, StoreError> {
        Ok(self.branches.lock().get(id).cloned())
    }

    async fn save_branch(&self, record: &IntegrationBranchRecord) -> Result<(), StoreError> {
        self.branches.lock().insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list_branches(
        &self,
        destination: &EnvironmentId,
    ) -> Result<Vec<IntegrationBranchRecord>, StoreError> {
        let mut records: Vec<_> = self
            .branches
            .lock()
            .values()
            .filter(|r| &r.dest_env == destination)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn load_snapshot(
        &self,
        environment: &EnvironmentId,
    ) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.snapshots.lock().get(environment).cloned())
    }

    async fn save_snapshot(
        &self,
        environment: &EnvironmentId,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .insert(environment.clone(), snapshot.clone());
        Ok(())
    }
}
