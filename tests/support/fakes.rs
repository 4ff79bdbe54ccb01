// ABOUTME: Recording fakes for the VCS, metadata API, working-set, and store collaborators.
// ABOUTME: All fakes append to one shared journal so cross-collaborator ordering can be asserted.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use sfpromote::metadata::{Manifest, MetadataSource, Snapshot, SourceError};
use sfpromote::remote::{
    DeployKind, DeployReport, DeployRequest, ListOutcome, MetadataApi, MetadataRecord,
    RemoteError,
};
use sfpromote::store::{
    EnvironmentRecord, IntegrationBranchRecord, MemoryStore, Store, StoreError,
};
use sfpromote::types::{BranchId, BranchName, CommitId, EnvironmentId, MetadataType};
use sfpromote::vcs::{VcsError, VcsOps};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Clone { remote: String, path: PathBuf },
    CreateBranch(String),
    Checkout(String),
    UpdateBranch(String),
    Merge(String),
    Push { remote: String, branch: String },
    Deploy {
        kind: DeployKind,
        validate: bool,
        components: Vec<String>,
    },
    Login,
    ListMetadata(String),
    Retrieve(PathBuf),
    WorkingSet(PathBuf),
}

/// Shared, ordered log of every collaborator call.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    pub fn push(&self, event: Event) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    pub fn deploys(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Deploy { .. }))
            .collect()
    }

    pub fn pushes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Push { .. }))
            .count()
    }

    /// Index of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events().iter().position(pred)
    }
}

// =============================================================================
// VCS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VcsOp {
    Clone,
    CreateBranch,
    Checkout,
    Update,
    Merge,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsFailure {
    Conflict,
    Git,
}

/// Answers every call with a fresh commit id unless a failure is injected.
#[derive(Debug)]
pub struct FakeVcs {
    journal: Journal,
    commits: AtomicUsize,
    failures: Mutex<HashMap<VcsOp, VcsFailure>>,
}

impl FakeVcs {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            commits: AtomicUsize::new(0),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Make every later call of `op` fail.
    pub fn fail(&self, op: VcsOp, failure: VcsFailure) {
        self.failures.lock().insert(op, failure);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    fn check(&self, op: VcsOp) -> Result<(), VcsError> {
        match self.failures.lock().get(&op) {
            Some(VcsFailure::Conflict) => Err(VcsError::Conflict {
                paths: vec!["classes/Foo.cls".to_string()],
            }),
            Some(VcsFailure::Git) => Err(VcsError::Git(format!("injected {:?} failure", op))),
            None => Ok(()),
        }
    }

    fn next_commit(&self) -> CommitId {
        let n = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        CommitId::new(format!("{:040x}", n))
    }
}

#[async_trait]
impl VcsOps for FakeVcs {
    async fn clone_repo(&self, remote: &str, path: &Path) -> Result<(), VcsError> {
        self.journal.push(Event::Clone {
            remote: remote.to_string(),
            path: path.to_path_buf(),
        });
        self.check(VcsOp::Clone)
    }

    async fn create_branch(&self, _path: &Path, name: &BranchName) -> Result<(), VcsError> {
        self.journal.push(Event::CreateBranch(name.to_string()));
        self.check(VcsOp::CreateBranch)
    }

    async fn checkout(&self, _path: &Path, name: &BranchName) -> Result<CommitId, VcsError> {
        self.journal.push(Event::Checkout(name.to_string()));
        self.check(VcsOp::Checkout)?;
        Ok(self.next_commit())
    }

    async fn update_branch(&self, _path: &Path, name: &BranchName) -> Result<(), VcsError> {
        self.journal.push(Event::UpdateBranch(name.to_string()));
        self.check(VcsOp::Update)
    }

    async fn merge(&self, _path: &Path, from: &BranchName) -> Result<CommitId, VcsError> {
        self.journal.push(Event::Merge(from.to_string()));
        self.check(VcsOp::Merge)?;
        Ok(self.next_commit())
    }

    async fn push(&self, _path: &Path, remote: &str, name: &BranchName) -> Result<(), VcsError> {
        self.journal.push(Event::Push {
            remote: remote.to_string(),
            branch: name.to_string(),
        });
        self.check(VcsOp::Push)
    }
}

// =============================================================================
// Metadata API
// =============================================================================

/// What `list_metadata` answers for one type.
#[derive(Debug, Clone)]
pub enum Listing {
    Records(Vec<MetadataRecord>),
    Nothing,
    Fail(String),
}

#[derive(Debug)]
pub struct FakeApi {
    journal: Journal,
    deploy_results: Mutex<VecDeque<Result<DeployReport, RemoteError>>>,
    deploy_delay: Mutex<Option<Duration>>,
    listings: Mutex<HashMap<String, Listing>>,
    login_ok: AtomicBool,
}

impl FakeApi {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            deploy_results: Mutex::new(VecDeque::new()),
            deploy_delay: Mutex::new(None),
            listings: Mutex::new(HashMap::new()),
            login_ok: AtomicBool::new(true),
        }
    }

    /// Queue the answer for the next deploy call. Unqueued calls succeed.
    pub fn push_deploy_result(&self, result: Result<DeployReport, RemoteError>) {
        self.deploy_results.lock().push_back(result);
    }

    pub fn delay_deploys(&self, delay: Duration) {
        *self.deploy_delay.lock() = Some(delay);
    }

    pub fn set_listing(&self, object_type: &str, listing: Listing) {
        self.listings.lock().insert(object_type.to_string(), listing);
    }

    pub fn reject_logins(&self) {
        self.login_ok.store(false, Ordering::SeqCst);
    }
}

fn components(manifest: &Manifest) -> Vec<String> {
    manifest
        .types()
        .flat_map(|(t, names)| names.iter().map(move |n| format!("{}/{}", t, n)))
        .collect()
}

#[async_trait]
impl MetadataApi for FakeApi {
    async fn login(&self) -> Result<(), RemoteError> {
        self.journal.push(Event::Login);
        if self.login_ok.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::AuthenticationFailed {
                username: "deploy@example.com".to_string(),
                reason: "INVALID_LOGIN".to_string(),
            })
        }
    }

    async fn list_metadata(&self, object_type: &MetadataType) -> Result<ListOutcome, RemoteError> {
        self.journal
            .push(Event::ListMetadata(object_type.to_string()));
        let listing = self.listings.lock().get(object_type.as_str()).cloned();
        match listing {
            Some(Listing::Records(records)) => Ok(ListOutcome::Records(records)),
            Some(Listing::Nothing) | None => Ok(ListOutcome::NothingToGather),
            Some(Listing::Fail(message)) => Err(RemoteError::Fault(message)),
        }
    }

    async fn deploy(&self, request: &DeployRequest) -> Result<DeployReport, RemoteError> {
        self.journal.push(Event::Deploy {
            kind: request.kind,
            validate: request.validate,
            components: components(&request.manifest),
        });
        let delay = *self.deploy_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.deploy_results.lock().pop_front();
        next.unwrap_or_else(|| Ok(DeployReport::succeeded()))
    }

    async fn retrieve(&self, _manifest: &Manifest, destination: &Path) -> Result<(), RemoteError> {
        self.journal.push(Event::Retrieve(destination.to_path_buf()));
        Ok(())
    }
}

// =============================================================================
// Working set
// =============================================================================

#[derive(Debug)]
pub struct FakeSource {
    journal: Journal,
    snapshot: Mutex<Snapshot>,
    fail: AtomicBool,
}

impl FakeSource {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            snapshot: Mutex::new(Snapshot::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set(&self, snapshot: Snapshot) {
        *self.snapshot.lock() = snapshot;
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataSource for FakeSource {
    async fn working_set(&self, root: &Path) -> Result<Snapshot, SourceError> {
        self.journal.push(Event::WorkingSet(root.to_path_buf()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceError::MissingRoot(root.to_path_buf()));
        }
        Ok(self.snapshot.lock().clone())
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    SaveEnvironment,
    SaveBranch,
    ListBranches,
    SaveSnapshot,
}

/// In-memory store that fails chosen writes once, on request.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    // Calls of each op still allowed through before the one that fails.
    pending: Mutex<HashMap<StoreOp, usize>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `skip` calls of `op` succeed, then fail the next one.
    pub fn fail_after(&self, op: StoreOp, skip: usize) {
        self.pending.lock().insert(op, skip);
    }

    pub fn fail_next(&self, op: StoreOp) {
        self.fail_after(op, 0);
    }

    fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        let mut pending = self.pending.lock();
        match pending.get_mut(&op) {
            Some(0) => {
                pending.remove(&op);
                Err(StoreError::Unavailable("down".to_string()))
            }
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn load_environment(
        &self,
        id: &EnvironmentId,
    ) -> Result<Option<EnvironmentRecord>, StoreError> {
        self.inner.load_environment(id).await
    }

    async fn save_environment(&self, record: &EnvironmentRecord) -> Result<(), StoreError> {
        self.check(StoreOp::SaveEnvironment)?;
        self.inner.save_environment(record).await
    }

    async fn load_branch(
        &self,
        id: &BranchId,
    ) -> Result<Option<IntegrationBranchRecord>, StoreError> {
        self.inner.load_branch(id).await
    }

    async fn save_branch(&self, record: &IntegrationBranchRecord) -> Result<(), StoreError> {
        self.check(StoreOp::SaveBranch)?;
        self.inner.save_branch(record).await
    }

    async fn list_branches(
        &self,
        destination: &EnvironmentId,
    ) -> Result<Vec<IntegrationBranchRecord>, StoreError> {
        self.check(StoreOp::ListBranches)?;
        self.inner.list_branches(destination).await
    }

    async fn load_snapshot(
        &self,
        environment: &EnvironmentId,
    ) -> Result<Option<Snapshot>, StoreError> {
        self.inner.load_snapshot(environment).await
    }

    async fn save_snapshot(
        &self,
        environment: &EnvironmentId,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError> {
        self.check(StoreOp::SaveSnapshot)?;
        self.inner.save_snapshot(environment, snapshot).await
    }
}
