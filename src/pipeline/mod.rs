// ABOUTME: Integration branch pipeline using the type state pattern.
// ABOUTME: Exports state markers, the branch types, and the pipeline error.

mod branch;
mod context;
mod error;
mod state;
mod transitions;

pub use branch::{AnyIntegrationBranch, IntegrationBranch};
pub use context::{PipelineContext, PipelineSettings};
pub use error::{DeployStage, PipelineError, PipelineErrorKind};
pub use state::{BranchState, Created, Deployed, Integrated};
pub use transitions::TransitionResult;
