//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures (validation, stock
/// invariants, lifecycle violations, conflicts). Infrastructure concerns
/// belong elsewhere. A failed operation leaves prior state untouched; none
/// of these variants imply a partial result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. non-positive quantity, blank code).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A requested resource (article, order, line) was not found.
    #[error("not found")]
    NotFound,

    /// A stock exit would drive the on-hand quantity below zero.
    ///
    /// The attempted movement is rejected entirely, never clamped to zero.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { available: i64, requested: i64 },

    /// A lifecycle violation: mutating a terminal order, an unreachable
    /// target state, finalizing an empty sale.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A conflict occurred (stale version / duplicate code / referenced row).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn insufficient_stock(available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            available,
            requested,
        }
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
