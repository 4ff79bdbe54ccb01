// ABOUTME: Two-environment pipeline harness wired to recording fakes.
// ABOUTME: QA promotes into UAT; both share one journal with the VCS and working-set fakes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sfpromote::environment::{Environment, EnvironmentLock};
use sfpromote::metadata::{ObjectKey, SfObject, Snapshot};
use sfpromote::pipeline::{
    Created, Integrated, IntegrationBranch, PipelineContext, PipelineSettings,
};
use sfpromote::store::{BranchRef, EnvironmentRecord, Store};
use sfpromote::types::{BranchName, EnvironmentId, EnvironmentName, MetadataType};

use super::fakes::{FakeApi, FakeSource, FakeVcs, FlakyStore, Journal};

pub const REPOSITORY: &str = "git@example.com:org/metadata.git";

pub struct Harness {
    pub journal: Journal,
    pub store: Arc<FlakyStore>,
    pub vcs: Arc<FakeVcs>,
    pub source: Arc<FakeSource>,
    pub qa_api: Arc<FakeApi>,
    pub uat_api: Arc<FakeApi>,
    pub qa: Environment,
    pub uat: Environment,
    pub ctx: PipelineContext,
}

pub fn record(name: &str, branch: &str) -> EnvironmentRecord {
    EnvironmentRecord {
        id: EnvironmentId::new(name),
        name: EnvironmentName::new(name).unwrap(),
        branch: BranchRef {
            name: BranchName::new(branch).unwrap(),
            local_path: PathBuf::from(format!("/work/{}", name)),
        },
        push_remote: "origin".to_string(),
        host: "test.salesforce.com".to_string(),
        active_branch: None,
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_baseline(Snapshot::new()).await
    }

    /// UAT starts with `baseline` as its deployed state.
    pub async fn with_baseline(baseline: Snapshot) -> Self {
        super::init_tracing();

        let journal = Journal::default();
        let store = Arc::new(FlakyStore::new());
        let vcs = Arc::new(FakeVcs::new(journal.clone()));
        let source = Arc::new(FakeSource::new(journal.clone()));
        let qa_api = Arc::new(FakeApi::new(journal.clone()));
        let uat_api = Arc::new(FakeApi::new(journal.clone()));

        let qa_record = record("qa", "qa");
        let uat_record = record("uat", "uat");
        store.save_environment(&qa_record).await.unwrap();
        store.save_environment(&uat_record).await.unwrap();
        store
            .save_snapshot(&uat_record.id, &baseline)
            .await
            .unwrap();

        let qa = Environment::new(
            qa_record,
            qa_api.clone(),
            EnvironmentLock::in_process(EnvironmentName::new("qa").unwrap()),
            Snapshot::new(),
        );
        let uat = Environment::new(
            uat_record,
            uat_api.clone(),
            EnvironmentLock::in_process(EnvironmentName::new("uat").unwrap()),
            baseline,
        );

        let ctx = PipelineContext::new(
            store.clone(),
            vcs.clone(),
            source.clone(),
            PipelineSettings::new(REPOSITORY).with_deploy_timeout(Duration::from_millis(200)),
        );

        Self {
            journal,
            store,
            vcs,
            source,
            qa_api,
            uat_api,
            qa,
            uat,
            ctx,
        }
    }

    pub async fn created(&self, name: &str) -> IntegrationBranch<Created> {
        IntegrationBranch::create(&self.ctx, branch(name), &self.qa, &self.uat)
            .await
            .expect("branch creation should succeed")
    }

    pub async fn integrated(&self, name: &str) -> IntegrationBranch<Integrated> {
        self.created(name)
            .await
            .integrate(&self.ctx, &self.qa, &self.uat)
            .await
            .map_err(|(_, e)| e)
            .expect("integration should succeed")
    }
}

pub fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

pub fn object(object_type: &str, name: &str, hash: &str) -> SfObject {
    SfObject::new(MetadataType::new(object_type).unwrap(), name).with_content_hash(hash)
}

pub fn key(object_type: &str, name: &str) -> ObjectKey {
    ObjectKey::new(MetadataType::new(object_type).unwrap(), name)
}

pub fn snapshot(objects: &[(&str, &str, &str)]) -> Snapshot {
    objects
        .iter()
        .map(|(t, n, h)| object(t, n, h))
        .collect()
}
