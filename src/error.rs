//! Error taxonomy for the inventory core.
//!
//! Every mutation entry point returns [`LedgerError`]. Validation errors
//! are raised before any transaction opens; everything else rolls back the
//! open transaction before it reaches the caller.

/// Errors produced by allocation, ingestion, and set editing.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed set or part number, non-positive quantity or priority.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown set, unknown part+color, or unresolvable element id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request is well-formed but contradicts stored state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The catalog collaborator failed or returned something unusable.
    #[error("Catalog error: {0}")]
    ExternalService(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
