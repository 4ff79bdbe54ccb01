// ABOUTME: Version-control boundary used by the promotion pipeline.
// ABOUTME: Exports the VcsOps trait and its git2-backed implementation.

mod error;
mod git;
mod traits;

pub use error::VcsError;
pub use git::GitRepository;
pub use traits::VcsOps;
