// ABOUTME: Metadata objects, snapshots, manifests, and changeset computation.
// ABOUTME: Pure data plus the gathering and working-set readers built on it.

mod changeset;
mod gather;
mod manifest;
mod object;
mod source;

pub use changeset::{Changeset, diff};
pub use gather::{gather_metadata, retrieve_environment};
pub use manifest::{Manifest, ManifestEntry};
pub use object::{ObjectKey, SfObject, Snapshot};
pub use source::{MetadataSource, SourceError, SourceTreeScanner};
