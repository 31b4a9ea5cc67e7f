//! Error handling for the engine

use std::sync::Arc;

/// Engine error type
///
/// Only lookups of a named entity fail loudly. Sparse data (no sales, no plan,
/// empty cohorts) always yields a zero-valued aggregate instead of an error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Whether the caller should surface this as a client-visible "not found"
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }

    pub(crate) fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        EngineError::NotFound(format!("{} {}", entity, id))
    }

    /// Unwrap an error shared between callers of one cached computation.
    /// Database errors cannot be cloned and degrade to `Internal`.
    pub(crate) fn from_shared(err: Arc<EngineError>) -> Self {
        match &*err {
            EngineError::NotFound(msg) => EngineError::NotFound(msg.clone()),
            EngineError::InvalidPeriod(msg) => EngineError::InvalidPeriod(msg.clone()),
            EngineError::Database(db) => EngineError::Internal(format!("database error: {}", db)),
            EngineError::Internal(msg) => EngineError::Internal(msg.clone()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
