// ABOUTME: Computes the additions and deletions between two metadata snapshots.
// ABOUTME: "Added" means create-or-update, since remote deploys are upserts.

use std::collections::BTreeSet;

use super::manifest::Manifest;
use super::object::{ObjectKey, Snapshot};

/// Work needed to bring an environment's deployed state in line with a branch.
///
/// `added` and `deleted` never share an identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    pub added: BTreeSet<ObjectKey>,
    pub deleted: BTreeSet<ObjectKey>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }

    pub fn added_manifest(&self) -> Manifest {
        Manifest::from_keys(&self.added)
    }

    pub fn deleted_manifest(&self) -> Manifest {
        Manifest::from_keys(&self.deleted)
    }
}

/// Diff an environment's deployed baseline against a branch's working set.
///
/// An object in the branch but not the environment, or in both with
/// different content, is added. An object in the environment but not the
/// branch is deleted.
pub fn diff(environment: &Snapshot, branch: &Snapshot) -> Changeset {
    let added = branch
        .iter()
        .filter(|object| match environment.get(&object.key()) {
            Some(deployed) => !deployed.same_content(object),
            None => true,
        })
        .map(|object| object.key())
        .collect();

    let deleted = environment
        .keys()
        .filter(|key| !branch.contains(key))
        .cloned()
        .collect();

    Changeset { added, deleted }
}
