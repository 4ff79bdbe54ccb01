// ABOUTME: Capability trait for the remote metadata API.
// ABOUTME: Implementations own transport and session handling for one environment.

use async_trait::async_trait;
use std::path::Path;

use super::error::RemoteError;
use super::types::{DeployReport, DeployRequest, ListOutcome};
use crate::metadata::Manifest;
use crate::types::MetadataType;

/// Metadata API operations against one environment's org.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    /// Check that the configured credentials can open a session.
    async fn login(&self) -> Result<(), RemoteError>;

    /// List every component of one metadata type.
    async fn list_metadata(&self, object_type: &MetadataType) -> Result<ListOutcome, RemoteError>;

    /// Deploy a manifest. A delivered-but-rejected payload is `Ok` with an
    /// unsuccessful report; `Err` means the call itself failed.
    async fn deploy(&self, request: &DeployRequest) -> Result<DeployReport, RemoteError>;

    /// Retrieve the components in `manifest` and extract them under `destination`.
    async fn retrieve(&self, manifest: &Manifest, destination: &Path) -> Result<(), RemoteError>;
}
