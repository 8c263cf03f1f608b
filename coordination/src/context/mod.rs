//! Project Context: process-wide decisions, constraints and objectives
//!
//! Read by routing and fingerprinting, appended to after every execution.

pub mod store;
pub mod types;

pub use store::{ContextError, ContextResult, ContextStore, SharedContextStore};
pub use types::{ContextEntry, ContextUpdate, ProjectContext};
