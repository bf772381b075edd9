//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only (validation, quantity rules, missing
/// entities). Storage and locking failures belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A voucher, voucher line or container does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A quantity was non-positive or could not be parsed.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// A movement asked for more than the container currently holds.
    #[error(
        "insufficient quantity of {material} in {container} (requested {requested}, available {available})"
    )]
    InsufficientQuantity {
        container: String,
        material: String,
        requested: i64,
        available: i64,
    },

    /// A location identifier did not match the warehouse naming scheme.
    #[error("malformed location: {0}")]
    MalformedLocation(String),

    /// Source and destination of a material relocation are the same container.
    #[error("source and destination are the same container: {0}")]
    SameContainer(String),

    /// A voucher cannot be finalized while lines still have pending quantity.
    #[error("voucher {voucher} still has {pending} pending unit(s)")]
    PendingItemsRemain { voucher: String, pending: i64 },

    /// An identifier was invalid (e.g. blank scan input).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A value failed validation (e.g. malformed intake record).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A conflict occurred (duplicate registration, stale version).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn malformed_location(msg: impl Into<String>) -> Self {
        Self::MalformedLocation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
