//! Collection definitions for the record stores
//!
//! Each collection provides logical separation of record types while
//! sharing one store instance.

/// Collection for consultation cache records
pub const COL_CONSULTATIONS: &str = "consultations";

/// Collection for the project context
pub const COL_CONTEXT: &str = "context";

/// Collection for execution records
pub const COL_EXECUTIONS: &str = "executions";

/// All collection names
pub const ALL_COLLECTIONS: &[&str] = &[COL_CONSULTATIONS, COL_CONTEXT, COL_EXECUTIONS];

/// Key helpers
pub mod keys {
    /// Key of the single process-wide project context
    pub const PROJECT_CONTEXT: &str = "project";

    /// Key of an execution record
    pub fn execution(run_id: &uuid::Uuid) -> String {
        format!("run-{}", run_id)
    }

    /// Whether a key is safe to use as a file name and column key
    pub fn is_valid(key: &str) -> bool {
        !key.is_empty()
            && key.len() <= 200
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.')
    }
}
