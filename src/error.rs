//! Precondition failures for an import call.
//!
//! These are fatal for the whole call and surfaced before any phase runs.
//! Per-item failures never take this path; they are recorded in the result
//! summary and processing continues.

use thiserror::Error;

use crate::models::ContentKind;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("missing content type: pass \"type\" in the body or query string")]
    MissingKind,

    #[error("unknown content type: '{0}' (expected WORD, SENTENCE, or SHADOWING)")]
    UnknownKind(String),

    #[error("missing setId: pass \"setId\" in the body or query string")]
    MissingSetId,

    #[error("{kind} collection {id} not found")]
    CollectionNotFound { kind: ContentKind, id: i64 },

    #[error("unknown grouping strategy: '{0}' (only SIZE is supported)")]
    UnknownStrategy(String),

    #[error("SIZE strategy requires a \"size\" of at least 1")]
    MissingSize,

    #[error("invalid group size: {0} (must be at least 1)")]
    InvalidSize(i64),
}
