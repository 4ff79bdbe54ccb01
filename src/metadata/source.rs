// ABOUTME: Reads a branch's metadata working set from a checked-out working copy.
// ABOUTME: Maps source-format folders to metadata types and hashes component files.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::object::{SfObject, Snapshot};
use crate::types::MetadataType;

/// Errors reading a working set.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("working copy not found: {0}")]
    MissingRoot(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("working set scan aborted: {0}")]
    Aborted(String),
}

/// Produces the metadata snapshot of whatever is checked out at a path.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn working_set(&self, root: &Path) -> Result<Snapshot, SourceError>;
}

const COMPANION_SUFFIX: &str = "-meta.xml";

/// Folder name, file extension, and metadata type for each supported component kind.
const FOLDERS: &[(&str, &str, &str)] = &[
    ("applications", "app", "CustomApplication"),
    ("classes", "cls", "ApexClass"),
    ("components", "component", "ApexComponent"),
    ("labels", "labels", "CustomLabels"),
    ("layouts", "layout", "Layout"),
    ("objects", "object", "CustomObject"),
    ("pages", "page", "ApexPage"),
    ("permissionsets", "permissionset", "PermissionSet"),
    ("profiles", "profile", "Profile"),
    ("remoteSiteSettings", "remoteSite", "RemoteSiteSetting"),
    ("staticresources", "resource", "StaticResource"),
    ("tabs", "tab", "CustomTab"),
    ("triggers", "trigger", "ApexTrigger"),
    ("workflows", "workflow", "Workflow"),
];

/// Scans a working copy in the platform's source layout
/// (`classes/Foo.cls`, `objects/Bar__c.object`, ...).
///
/// A component's hash covers its body file and its `-meta.xml` companion.
/// Files in unknown folders are ignored.
#[derive(Debug, Clone, Default)]
pub struct SourceTreeScanner {
    /// Optional subdirectory holding the sources, e.g. `src`.
    pub subdir: Option<PathBuf>,
}

impl SourceTreeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subdir(subdir: impl Into<PathBuf>) -> Self {
        Self {
            subdir: Some(subdir.into()),
        }
    }

    fn scan(&self, root: &Path) -> Result<Snapshot, SourceError> {
        let base = match &self.subdir {
            Some(sub) => root.join(sub),
            None => root.to_path_buf(),
        };
        if !base.is_dir() {
            return Err(SourceError::MissingRoot(base));
        }

        let mut snapshot = Snapshot::new();
        for (folder, extension, type_name) in FOLDERS {
            let dir = base.join(folder);
            if !dir.is_dir() {
                continue;
            }
            let object_type = MetadataType::new(type_name)
                .map_err(|e| SourceError::Aborted(format!("bad type {}: {}", type_name, e)))?;
            for (name, files) in group_component_files(&dir, extension)? {
                let hash = hash_files(&files)?;
                snapshot.insert(SfObject::new(object_type.clone(), name).with_content_hash(hash));
            }
        }

        tracing::debug!("Scanned {} components under {}", snapshot.len(), base.display());
        Ok(snapshot)
    }
}

#[async_trait]
impl MetadataSource for SourceTreeScanner {
    async fn working_set(&self, root: &Path) -> Result<Snapshot, SourceError> {
        let scanner = self.clone();
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || scanner.scan(&root))
            .await
            .map_err(|e| SourceError::Aborted(e.to_string()))?
    }
}

/// Group a folder's files by component name. Body files come first, then
/// their companion, so the hash is stable.
fn group_component_files(
    dir: &Path,
    extension: &str,
) -> Result<BTreeMap<String, Vec<PathBuf>>, SourceError> {
    let entries = std::fs::read_dir(dir).map_err(|source| SourceError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let body_suffix = format!(".{}", extension);
    let companion_suffix = format!(".{}{}", extension, COMPANION_SUFFIX);
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

    for entry in entries {
        let entry = entry.map_err(|source| SourceError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if let Some(name) = file_name.strip_suffix(&companion_suffix) {
            groups.entry(name.to_string()).or_default().push(path);
        } else if let Some(name) = file_name.strip_suffix(&body_suffix) {
            groups.entry(name.to_string()).or_default().insert(0, path);
        }
    }

    Ok(groups)
}

fn hash_files(files: &[PathBuf]) -> Result<String, SourceError> {
    let mut hasher = Sha256::new();
    for path in files {
        let bytes = std::fs::read(path).map_err(|source| SourceError::Read {
            path: path.clone(),
            source,
        })?;
        hasher.update(&bytes);
    }
    Ok(hex::encode(hasher.finalize()))
}
