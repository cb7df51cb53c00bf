//! Typed errors surfaced by the core crate.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The field key is not part of the canonical registry.
    #[error("unknown field key: {0}")]
    UnknownFieldKey(String),

    /// NaN or infinite confidence; it cannot be stored as JSON.
    #[error("non-finite confidence for field: {0}")]
    NonFiniteConfidence(String),

    /// No observation history has ever been recorded for the document.
    #[error("document not found: {0}")]
    DocumentNotFound(String),
}
