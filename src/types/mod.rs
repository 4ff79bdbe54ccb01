// ABOUTME: Type-safe identifiers and validated domain names.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod branch_name;
mod id;
mod metadata_type;

pub use branch_name::{BranchName, EnvironmentName, NameError};
pub use id::{BranchId, CommitId, EnvironmentId, Id};
pub use metadata_type::MetadataType;
