// ABOUTME: Pipeline error types with SNAFU pattern.
// ABOUTME: Wraps collaborator failures with branch, environment, and stage context.

use snafu::Snafu;
use std::fmt;

use super::state::BranchState;
use crate::environment::{LockError, LockInfo};
use crate::metadata::SourceError;
use crate::remote::RemoteError;
use crate::store::StoreError;
use crate::vcs::VcsError;

/// Which remote deploy call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    Deleted,
    Added,
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployStage::Deleted => f.write_str("deleted"),
            DeployStage::Added => f.write_str("added"),
        }
    }
}

/// Errors from creating, integrating, or deploying an integration branch.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    #[snafu(display("environment {environment} is locked by another deploy"))]
    LockHeld {
        environment: String,
        holder: Option<LockInfo>,
    },

    #[snafu(display("deploy lock for {environment} unavailable: {source}"))]
    Lock {
        environment: String,
        source: LockError,
    },

    #[snafu(display("merge conflict in {branch}: {}", paths.join(", ")))]
    MergeConflict { branch: String, paths: Vec<String> },

    #[snafu(display("deploy of {branch} failed at {stage} stage: {detail}"))]
    DeployFailed {
        branch: String,
        stage: DeployStage,
        detail: String,
        /// The remote may or may not have applied the payload.
        ambiguous: bool,
    },

    #[snafu(display("branch {branch} is {actual}, expected {expected}"))]
    InvalidState {
        branch: String,
        expected: BranchState,
        actual: BranchState,
    },

    #[snafu(display("environment {environment} already has active integration branch {active}"))]
    BranchInFlight { environment: String, active: String },

    #[snafu(display("integration branch {branch} already exists"))]
    BranchExists { branch: String },

    #[snafu(display("integration branch {branch} not found"))]
    BranchNotFound { branch: String },

    #[snafu(display("branch {branch} does not promote through environment {environment}"))]
    EnvironmentMismatch { branch: String, environment: String },

    #[snafu(display("{operation} failed for {branch}: {source}"))]
    Vcs {
        operation: &'static str,
        branch: String,
        source: VcsError,
    },

    #[snafu(display("failed to persist {what}: {source}"))]
    Persistence { what: String, source: StoreError },

    #[snafu(display("failed to read working set of {branch}: {source}"))]
    WorkingSet { branch: String, source: SourceError },

    #[snafu(display("remote call for {environment} failed: {source}"))]
    Remote {
        environment: String,
        source: RemoteError,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    /// Another deploy holds the environment; retry later.
    LockHeld,
    /// Operator must resolve the conflict by hand.
    MergeConflict,
    /// The remote rejected the payload.
    DeployFailed,
    /// The remote call timed out or dropped; its effect is unknown.
    DeployAmbiguous,
    /// The branch is not in the state the operation requires.
    InvalidState,
    /// The destination already has an integration branch in flight.
    BranchInFlight,
    /// Branch missing, duplicated, or pointed at the wrong environment.
    BranchRecord,
    Vcs,
    Persistence,
    WorkingSet,
    Remote,
}

impl PipelineError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            PipelineError::LockHeld { .. } => PipelineErrorKind::LockHeld,
            PipelineError::Lock { source, .. } => match source {
                LockError::Held { .. } => PipelineErrorKind::LockHeld,
                LockError::Io { .. } => PipelineErrorKind::Persistence,
            },
            PipelineError::MergeConflict { .. } => PipelineErrorKind::MergeConflict,
            PipelineError::DeployFailed { ambiguous, .. } => {
                if *ambiguous {
                    PipelineErrorKind::DeployAmbiguous
                } else {
                    PipelineErrorKind::DeployFailed
                }
            }
            PipelineError::InvalidState { .. } => PipelineErrorKind::InvalidState,
            PipelineError::BranchInFlight { .. } => PipelineErrorKind::BranchInFlight,
            PipelineError::BranchExists { .. }
            | PipelineError::BranchNotFound { .. }
            | PipelineError::EnvironmentMismatch { .. } => PipelineErrorKind::BranchRecord,
            PipelineError::Vcs { .. } => PipelineErrorKind::Vcs,
            PipelineError::Persistence { .. } => PipelineErrorKind::Persistence,
            PipelineError::WorkingSet { .. } => PipelineErrorKind::WorkingSet,
            PipelineError::Remote { .. } => PipelineErrorKind::Remote,
        }
    }

    /// Returns lock holder info if this is a contention failure.
    pub fn lock_holder_info(&self) -> Option<&LockInfo> {
        match self {
            PipelineError::LockHeld { holder, .. } => holder.as_ref(),
            _ => None,
        }
    }

    /// True when the remote side effect may have happened despite the error.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, PipelineError::DeployFailed { ambiguous: true, .. })
    }
}

impl From<LockError> for PipelineError {
    fn from(source: LockError) -> Self {
        match source {
            LockError::Held {
                environment,
                holder,
            } => PipelineError::LockHeld {
                environment,
                holder,
            },
            LockError::Io { ref path, .. } => {
                let environment = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                PipelineError::Lock {
                    environment,
                    source,
                }
            }
        }
    }
}
