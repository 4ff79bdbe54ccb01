// ABOUTME: Library root for sfpromote - metadata promotion through environment tiers.
// ABOUTME: Integration branches are created, integrated, and deployed via the pipeline module.

pub mod config;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod remote;
pub mod store;
pub mod types;
pub mod vcs;
