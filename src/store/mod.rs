// ABOUTME: Persistent storage of environment, branch, and snapshot records.
// ABOUTME: Exports the Store trait with JSON-file and in-memory implementations.

mod error;
mod json;
mod memory;
mod records;
mod traits;

pub use error::StoreError;
pub use json::JsonStore;
pub use memory::MemoryStore;
pub use records::{BranchRef, EnvironmentRecord, IntegrationBranchRecord};
pub use traits::Store;
