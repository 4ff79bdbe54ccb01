// ABOUTME: Filesystem store keeping one JSON document per record.
// ABOUTME: Writes go to a temporary sibling and are renamed into place.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use super::error::StoreError;
use super::records::{EnvironmentRecord, IntegrationBranchRecord};
use super::traits::Store;
use crate::metadata::Snapshot;
use crate::types::{BranchId, EnvironmentId};

const ENVIRONMENTS_DIR: &str = "environments";
const BRANCHES_DIR: &str = "branches";
const SNAPSHOTS_DIR: &str = "snapshots";

/// Layout under `root`:
///
/// ```text
/// environments/<id>.json
/// branches/<id>.json
/// snapshots/<id>.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, dir: &str, id: &str) -> PathBuf {
        self.root.join(dir).join(format!("{}.json", file_stem(id)))
    }

    async fn read<T: DeserializeOwned>(&self, path: PathBuf) -> Result<Option<T>, StoreError> {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Decode { path, source })
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        path: PathBuf,
        value: &T,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(value)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{}.tmp", file_name));
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }
}

/// Branch ids may contain `/`; escape it (and the escape character) so
/// every record is a single file and distinct ids never collide.
fn file_stem(id: &str) -> String {
    id.replace('%', "%25").replace('/', "%2F")
}

#[async_trait]
impl Store for JsonStore {
    async fn load_environment(
        &self,
        id: &EnvironmentId,
    ) -> Result<Option<EnvironmentRecord>, StoreError> {
        self.read(self.path(ENVIRONMENTS_DIR, id.as_str())).await
    }

    async fn save_environment(&self, record: &EnvironmentRecord) -> Result<(), StoreError> {
        self.write(self.path(ENVIRONMENTS_DIR, record.id.as_str()), record)
            .await
    }

    async fn load_branch(
        &self,
        id: &BranchId,
    ) -> Result<Option<IntegrationBranchRecord>, StoreError> {
        self.read(self.path(BRANCHES_DIR, id.as_str())).await
    }

    async fn save_branch(&self, record: &IntegrationBranchRecord) -> Result<(), StoreError> {
        self.write(self.path(BRANCHES_DIR, record.id.as_str()), record)
            .await
    }

    async fn list_branches(
        &self,
        destination: &EnvironmentId,
    ) -> Result<Vec<IntegrationBranchRecord>, StoreError> {
        let dir = self.root.join(BRANCHES_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };

        let mut records = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            let Some(entry) = entry else { break };
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Some(record) = self.read::<IntegrationBranchRecord>(path).await?
                && &record.dest_env == destination
            {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn load_snapshot(
        &self,
        environment: &EnvironmentId,
    ) -> Result<Option<Snapshot>, StoreError> {
        self.read(self.path(SNAPSHOTS_DIR, environment.as_str())).await
    }

    async fn save_snapshot(
        &self,
        environment: &EnvironmentId,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError> {
        self.write(self.path(SNAPSHOTS_DIR, environment.as_str()), snapshot)
            .await
    }
}
