use thiserror::Error;

/// Simple result type used across the database interface.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// Transient engine failure.  Callers retry with bounded backoff.
    #[error("io: {0}")]
    Io(String),

    /// Unrecoverable.  The node terminates with a diagnostic.
    #[error("corruption: {0}")]
    Corruption(String),

    #[error("entry not found")]
    NotFound,

    #[error("{0}")]
    Other(String),
}
