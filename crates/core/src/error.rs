//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
///
/// Every kind maps to a distinct, actionable message; callers must surface
/// them verbatim rather than collapsing them into a generic failure. Only
/// `DataIntegrity` is the "log loudly, do not retry" class.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    ///
    /// Recoverable: the caller should re-read the aggregate and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,

    /// A status transition not present in the transition table, or a
    /// transition attempted by a role not in the entry's permitted set.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// An attempt to advance a request out of assignment before every line
    /// item is covered. Carries the uncovered line numbers so the caller can
    /// remediate.
    #[error("assignment incomplete: unassigned line items {0:?}")]
    IncompleteAssignment(Vec<u32>),

    /// An over-budget supplier selection was attempted without a reason.
    #[error("missing justification for over-budget selection")]
    MissingJustification,

    /// Caller/collaborator bug (e.g. a selected quotation that does not
    /// belong to the RFQ under consideration). Fatal; never retried.
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn data_integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    /// Whether a caller may reasonably retry after re-reading state.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
