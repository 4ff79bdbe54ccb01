// ABOUTME: Boundary to the remote configuration-management platform's metadata API.
// ABOUTME: Exports the MetadataApi trait, request/response types, and errors.

mod error;
mod traits;
mod types;

pub use error::RemoteError;
pub use traits::MetadataApi;
pub use types::{
    Credentials, DeployKind, DeployReport, DeployRequest, ListOutcome, MetadataRecord,
};
