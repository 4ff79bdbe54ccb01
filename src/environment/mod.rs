// ABOUTME: Environment aggregate: deploy lock, deployed baseline, and active-branch pointer.
// ABOUTME: One value per promotion target, shared by every operation touching it.

mod lock;

pub use lock::{EnvironmentLock, LockError, LockGuard, LockInfo};

use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

use crate::config::EnvironmentSettings;
use crate::diagnostics::Diagnostics;
use crate::metadata::{Manifest, Snapshot, gather_metadata, retrieve_environment};
use crate::remote::{MetadataApi, RemoteError};
use crate::store::{BranchRef, EnvironmentRecord, Store, StoreError};
use crate::types::{BranchId, EnvironmentId, EnvironmentName, MetadataType};

/// A promotion target (QA, UAT, production, ...).
///
/// The deployed baseline sits behind an `Arc` swap: readers clone the
/// pointer and never see a snapshot that is still being replaced. The
/// working-copy mutex serializes every VCS operation on this environment's
/// local checkout, whether it comes from `integrate` or `deploy`.
pub struct Environment {
    id: EnvironmentId,
    name: EnvironmentName,
    record: RwLock<EnvironmentRecord>,
    api: Arc<dyn MetadataApi>,
    lock: EnvironmentLock,
    working_copy: tokio::sync::Mutex<()>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.id)
            .field("record", &*self.record.read())
            .field("locked", &self.lock.is_held())
            .field("snapshot_len", &self.snapshot.read().len())
            .finish()
    }
}

impl Environment {
    pub fn new(
        record: EnvironmentRecord,
        api: Arc<dyn MetadataApi>,
        lock: EnvironmentLock,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            record: RwLock::new(record),
            api,
            lock,
            working_copy: tokio::sync::Mutex::new(()),
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Load the persisted record and baseline, creating the record on first
    /// use. Configured fields (branch, path, host, push remote) override
    /// whatever was stored; the active-branch pointer is kept.
    pub async fn load(
        store: &dyn Store,
        settings: &EnvironmentSettings,
        api: Arc<dyn MetadataApi>,
    ) -> Result<Self, StoreError> {
        let id = EnvironmentId::new(settings.name.as_str());
        let branch = BranchRef {
            name: settings.branch.clone(),
            local_path: settings.local_path.clone(),
        };

        let stored = store.load_environment(&id).await?;
        let record = EnvironmentRecord {
            id: id.clone(),
            name: settings.name.clone(),
            branch,
            push_remote: settings.push_remote.clone(),
            host: settings.credentials.host.clone(),
            active_branch: stored.as_ref().and_then(|r| r.active_branch.clone()),
        };
        if stored.as_ref() != Some(&record) {
            store.save_environment(&record).await?;
        }

        let snapshot = store.load_snapshot(&id).await?.unwrap_or_default();
        tracing::debug!(
            "Loaded environment {} ({} objects in baseline)",
            settings.name,
            snapshot.len()
        );

        let lock = EnvironmentLock::with_file(settings.name.clone(), &settings.lock_path);
        Ok(Self::new(record, api, lock, snapshot))
    }

    pub fn id(&self) -> &EnvironmentId {
        &self.id
    }

    pub fn name(&self) -> &EnvironmentName {
        &self.name
    }

    pub fn record(&self) -> EnvironmentRecord {
        self.record.read().clone()
    }

    /// Mainline branch and the working copy shared by all branches promoting here.
    pub fn branch(&self) -> BranchRef {
        self.record.read().branch.clone()
    }

    pub fn push_remote(&self) -> String {
        self.record.read().push_remote.clone()
    }

    pub fn active_branch(&self) -> Option<BranchId> {
        self.record.read().active_branch.clone()
    }

    pub fn api(&self) -> &dyn MetadataApi {
        self.api.as_ref()
    }

    pub fn lock(&self) -> &EnvironmentLock {
        &self.lock
    }

    /// Exclusive access to the local working copy.
    pub async fn lock_working_copy(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.working_copy.lock().await
    }

    /// The last-known deployed baseline.
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.snapshot.read())
    }

    /// Persist and install a new deployed baseline. The in-memory baseline
    /// only changes once the store has accepted it.
    pub async fn snapshot(&self, store: &dyn Store, set: Snapshot) -> Result<(), StoreError> {
        store.save_snapshot(&self.id, &set).await?;
        let len = set.len();
        *self.snapshot.write() = Arc::new(set);
        tracing::info!("Snapshot of {} updated ({} objects)", self.name, len);
        Ok(())
    }

    /// Point the environment at a new active integration branch, or clear it.
    pub async fn set_active_branch(
        &self,
        store: &dyn Store,
        branch: Option<BranchId>,
    ) -> Result<(), StoreError> {
        let mut record = self.record();
        record.active_branch = branch;
        store.save_environment(&record).await?;
        *self.record.write() = record;
        Ok(())
    }

    /// Rebuild the baseline from what the remote org currently reports.
    pub async fn refresh_snapshot(
        &self,
        store: &dyn Store,
        types: &[MetadataType],
        diag: &mut Diagnostics,
    ) -> Result<Arc<Snapshot>, StoreError> {
        tracing::info!("Gathering metadata for {}", self.name);
        let gathered = gather_metadata(self.api.as_ref(), types, diag).await;
        self.snapshot(store, gathered).await?;
        Ok(self.current_snapshot())
    }

    /// Check the environment's credentials against the remote org.
    pub async fn validate_credentials(&self) -> bool {
        match self.api.login().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Credentials for {} rejected: {}", self.name, e);
                false
            }
        }
    }

    /// Retrieve every component in the baseline into `destination`.
    pub async fn retrieve(&self, destination: &Path) -> Result<Manifest, RemoteError> {
        let snapshot = self.current_snapshot();
        retrieve_environment(self.api.as_ref(), &snapshot, destination).await
    }
}
