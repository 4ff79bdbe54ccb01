// ABOUTME: Collaborators and settings shared by every pipeline operation.
// ABOUTME: Injected explicitly rather than read from global client configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, DEFAULT_API_VERSION};
use crate::metadata::MetadataSource;
use crate::store::Store;
use crate::vcs::VcsOps;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Remote URL cloned into each environment's working copy.
    pub repository: String,
    pub api_version: String,
    /// Upper bound on each remote deploy call.
    pub deploy_timeout: Duration,
}

impl PipelineSettings {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            deploy_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_deploy_timeout(mut self, timeout: Duration) -> Self {
        self.deploy_timeout = timeout;
        self
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            repository: config.repository.clone(),
            api_version: config.api_version.clone(),
            deploy_timeout: config.deploy_timeout,
        }
    }
}

#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<dyn Store>,
    pub vcs: Arc<dyn VcsOps>,
    pub source: Arc<dyn MetadataSource>,
    pub settings: PipelineSettings,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    pub fn new(
        store: Arc<dyn Store>,
        vcs: Arc<dyn VcsOps>,
        source: Arc<dyn MetadataSource>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            vcs,
            source,
            settings,
        }
    }
}
