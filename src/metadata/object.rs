// ABOUTME: Metadata objects and identity-keyed snapshots of them.
// ABOUTME: Identity is (object_type, full_name); dates and hashes only detect change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::MetadataType;

/// Identity of a metadata object on the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub object_type: MetadataType,
    pub full_name: String,
}

impl ObjectKey {
    pub fn new(object_type: MetadataType, full_name: impl Into<String>) -> Self {
        Self {
            object_type,
            full_name: full_name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.object_type, self.full_name)
    }
}

/// One metadata component, either listed from the remote or read from a working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SfObject {
    pub object_type: MetadataType,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<DateTime<Utc>>,
    /// Hex SHA-256 of the source files, set when read from a working copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl SfObject {
    pub fn new(object_type: MetadataType, full_name: impl Into<String>) -> Self {
        Self {
            object_type,
            full_name: full_name.into(),
            last_modified_date: None,
            content_hash: None,
        }
    }

    pub fn with_last_modified(mut self, date: DateTime<Utc>) -> Self {
        self.last_modified_date = Some(date);
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.object_type.clone(), self.full_name.clone())
    }

    /// Whether two versions of the same object carry the same content.
    ///
    /// Content hashes win when both sides have one; otherwise the
    /// last-modified dates are compared, and a missing date on only one
    /// side counts as a change.
    pub fn same_content(&self, other: &SfObject) -> bool {
        match (&self.content_hash, &other.content_hash) {
            (Some(a), Some(b)) => a == b,
            _ => self.last_modified_date == other.last_modified_date,
        }
    }
}

impl fmt::Display for SfObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.object_type, self.full_name)
    }
}

/// A set of metadata objects keyed by identity.
///
/// Inserting an object whose identity is already present replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SfObject>", into = "Vec<SfObject>")]
pub struct Snapshot {
    objects: BTreeMap<ObjectKey, SfObject>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: SfObject) -> Option<SfObject> {
        self.objects.insert(object.key(), object)
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&SfObject> {
        self.objects.get(key)
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SfObject> {
        self.objects.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ObjectKey> {
        self.objects.keys()
    }
}

impl FromIterator<SfObject> for Snapshot {
    fn from_iter<I: IntoIterator<Item = SfObject>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for object in iter {
            snapshot.insert(object);
        }
        snapshot
    }
}

impl Extend<SfObject> for Snapshot {
    fn extend<I: IntoIterator<Item = SfObject>>(&mut self, iter: I) {
        for object in iter {
            self.insert(object);
        }
    }
}

impl From<Vec<SfObject>> for Snapshot {
    fn from(objects: Vec<SfObject>) -> Self {
        objects.into_iter().collect()
    }
}

impl From<Snapshot> for Vec<SfObject> {
    fn from(snapshot: Snapshot) -> Self {
        snapshot.objects.into_values().collect()
    }
}
