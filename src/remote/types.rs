// ABOUTME: Request and response shapes exchanged with the metadata API.
// ABOUTME: Includes per-environment credentials with redacted Debug output.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

use crate::metadata::Manifest;

/// Login details for one environment's org.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub username: String,
    pub password: String,
    pub security_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("security_token", &"<redacted>")
            .finish()
    }
}

/// One entry returned by `list_metadata`.
///
/// The platform omits fields for some internal components, so every field
/// is optional and callers filter incomplete records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    pub full_name: Option<String>,
    pub last_modified_date: Option<DateTime<Utc>>,
    pub file_name: Option<String>,
}

/// Result of listing one metadata type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListOutcome {
    Records(Vec<MetadataRecord>),
    /// The org has no components of this type.
    NothingToGather,
}

/// What a deploy call does with the components in its manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployKind {
    /// Create or update the listed components from `source_root`.
    Upsert,
    /// Remove the listed components (destructive changes).
    Delete,
}

impl fmt::Display for DeployKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployKind::Upsert => f.write_str("upsert"),
            DeployKind::Delete => f.write_str("delete"),
        }
    }
}

/// A single deploy call.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub kind: DeployKind,
    pub manifest: Manifest,
    /// Working copy holding the component sources.
    pub source_root: PathBuf,
    /// Force the platform's validation (test run) on this call.
    pub validate: bool,
    pub api_version: String,
}

impl DeployRequest {
    /// The `package.xml` for this call. For deletions this is the
    /// destructive-changes manifest.
    pub fn package_xml(&self) -> String {
        self.manifest.to_package_xml(&self.api_version)
    }
}

/// The platform's verdict on a deploy call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub success: bool,
    pub diagnostics: Vec<String>,
}

impl DeployReport {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            diagnostics: Vec::new(),
        }
    }

    pub fn failed(diagnostics: Vec<String>) -> Self {
        Self {
            success: false,
            diagnostics,
        }
    }

    /// Diagnostics joined for an error message.
    pub fn detail(&self) -> String {
        if self.diagnostics.is_empty() {
            "deploy rejected without diagnostics".to_string()
        } else {
            self.diagnostics.join("; ")
        }
    }
}
