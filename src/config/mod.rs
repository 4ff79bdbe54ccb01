// ABOUTME: Configuration types and parsing for sfpromote.yml.
// ABOUTME: Handles YAML parsing, credential interpolation, and per-environment resolution.

mod deserialize;
mod env_value;
mod init;

pub use env_value::EnvValue;
pub use init::init_config;

use crate::environment::LockInfo;
use crate::error::{Error, Result};
use crate::remote::Credentials;
use crate::types::{BranchName, EnvironmentName, MetadataType};
use deserialize::{deserialize_environments, deserialize_metadata_types};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "sfpromote.yml";
pub const CONFIG_FILENAME_ALT: &str = "sfpromote.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".sfpromote/config.yml";

pub const DEFAULT_API_VERSION: &str = "31.0";
pub const DEFAULT_HOST: &str = "login.salesforce.com";

/// Types gathered when the config does not list its own.
pub const DEFAULT_METADATA_TYPES: &[&str] = &[
    "ApexClass",
    "ApexComponent",
    "ApexPage",
    "ApexTrigger",
    "CustomApplication",
    "CustomLabels",
    "CustomObject",
    "CustomTab",
    "Layout",
    "PermissionSet",
    "Profile",
    "RemoteSiteSetting",
    "StaticResource",
    "Workflow",
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Remote URL of the metadata repository.
    pub repository: String,

    /// Root directory for per-environment working copies.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Root directory for records, snapshots, and lock files.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_deploy_timeout", with = "humantime_serde")]
    pub deploy_timeout: Duration,

    /// Types to gather; `None` means `DEFAULT_METADATA_TYPES`.
    #[serde(default, deserialize_with = "deserialize_metadata_types")]
    pub metadata_types: Option<NonEmpty<MetadataType>>,

    #[serde(deserialize_with = "deserialize_environments")]
    pub environments: BTreeMap<EnvironmentName, EnvironmentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    /// Mainline branch tracking what is deployed to this environment.
    pub branch: BranchName,

    #[serde(default = "default_host")]
    pub host: String,

    pub username: EnvValue,

    pub password: EnvValue,

    #[serde(default)]
    pub security_token: EnvValue,

    /// Remote the merge-back is pushed to.
    #[serde(default = "default_push_remote")]
    pub push_remote: String,
}

/// One environment with paths derived and credentials resolved.
#[derive(Debug, Clone)]
pub struct EnvironmentSettings {
    pub name: EnvironmentName,
    pub branch: BranchName,
    pub local_path: PathBuf,
    pub push_remote: String,
    pub credentials: Credentials,
    pub lock_path: PathBuf,
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".sfpromote/work")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".sfpromote/state")
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_deploy_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_push_remote() -> String {
    "origin".to_string()
}

fn default_metadata_types() -> Vec<MetadataType> {
    DEFAULT_METADATA_TYPES
        .iter()
        .filter_map(|name| MetadataType::new(name).ok())
        .collect()
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.repository.trim().is_empty() {
            return Err(Error::InvalidConfig("repository cannot be empty".to_string()));
        }
        if self.environments.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one environment is required".to_string(),
            ));
        }
        if self.deploy_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "deploy_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Metadata types to gather, in configured order.
    pub fn metadata_types(&self) -> Vec<MetadataType> {
        match &self.metadata_types {
            Some(types) => types.iter().cloned().collect(),
            None => default_metadata_types(),
        }
    }

    /// Resolve one environment, reading any credentials from the process environment.
    pub fn environment(&self, name: &str) -> Result<EnvironmentSettings> {
        let (name, env) = self
            .environments
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .ok_or_else(|| Error::UnknownEnvironment(name.to_string()))?;

        let credentials = Credentials {
            host: env.host.clone(),
            username: env.username.resolve()?,
            password: env.password.resolve()?,
            security_token: env.security_token.resolve()?,
        };

        Ok(EnvironmentSettings {
            name: name.clone(),
            branch: env.branch.clone(),
            local_path: self.workspace.join(name.as_str()),
            push_remote: env.push_remote.clone(),
            credentials,
            lock_path: LockInfo::lock_path(&self.state_dir, name),
        })
    }

    pub fn template() -> Self {
        let mut environments = BTreeMap::new();
        for (name, branch) in [("qa", "qa"), ("uat", "uat"), ("prod", "main")] {
            if let (Ok(name), Ok(branch)) = (EnvironmentName::new(name), BranchName::new(branch)) {
                let var = name.as_str().to_uppercase();
                environments.insert(
                    name,
                    EnvironmentConfig {
                        branch,
                        host: default_host(),
                        username: EnvValue::FromEnv {
                            var: format!("{}_USERNAME", var),
                            default: None,
                        },
                        password: EnvValue::FromEnv {
                            var: format!("{}_PASSWORD", var),
                            default: None,
                        },
                        security_token: EnvValue::FromEnv {
                            var: format!("{}_SECURITY_TOKEN", var),
                            default: Some(String::new()),
                        },
                        push_remote: default_push_remote(),
                    },
                );
            }
        }

        Config {
            repository: "git@github.com:my-org/salesforce-metadata.git".to_string(),
            workspace: default_workspace(),
            state_dir: default_state_dir(),
            api_version: default_api_version(),
            deploy_timeout: default_deploy_timeout(),
            metadata_types: None,
            environments,
        }
    }
}
