//! Error types for aggrepo.

use thiserror::Error;

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for repository operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Zero rows where exactly one was required.
    #[error("entity not found")]
    NotFound,

    /// Optimistic-lock guard tripped: a versioned write affected zero rows.
    #[error("concurrent modification")]
    ConcurrentModification,

    /// Malformed pagination token.
    #[error("invalid cursor")]
    InvalidCursor(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid repository configuration (e.g. a relation's foreign key
    /// missing from its own column list, or a primary-key arity mismatch).
    #[error("configuration error: {0}")]
    Config(String),

    /// Row decode/conversion error.
    #[error("decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Pass-through statement/driver error, wrapped with phase context.
    #[error("{context}: {source}")]
    Database {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a decode error for a specific column.
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Wrap an underlying statement error with phase context.
    pub fn database(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Database {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Check if this is a lost optimistic-lock race.
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, Self::ConcurrentModification)
    }

    /// Check if this is an invalid cursor error.
    pub fn is_invalid_cursor(&self) -> bool {
        matches!(self, Self::InvalidCursor(_))
    }

    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
