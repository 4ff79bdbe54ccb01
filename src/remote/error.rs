// ABOUTME: Error types for remote metadata API calls.
// ABOUTME: Distinguishes rejected payloads from transport failures with unknown outcome.

/// Errors from the remote metadata API client.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Login or session refresh failed.
    #[error("authentication failed for {username}: {reason}")]
    AuthenticationFailed { username: String, reason: String },

    /// The platform could not be reached or the call was cut off.
    /// Whether the request took effect is unknown.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The platform answered with a fault.
    #[error("remote fault: {0}")]
    Fault(String),

    /// Retrieved archive could not be extracted.
    #[error("failed to extract retrieved metadata to {path}: {reason}")]
    Extract {
        path: std::path::PathBuf,
        reason: String,
    },
}

impl RemoteError {
    /// Whether the remote side effect may or may not have happened.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }
}
