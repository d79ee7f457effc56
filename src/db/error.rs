use thiserror::Error;

// DbError is the lowest level error type, wrapping errors from the persistence layer. It does not
// wrap any higher level errors. A missing record is not an error: lookups return `None`.
#[derive(Debug, Error)]
pub enum DbError {
    /// Unique constraint violation
    #[error("unique violation: {0}")]
    UniqueViolation(String),

    /// Record id space exhausted
    #[error("no free record index")]
    Exhausted,

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("input error: {0}")]
    Validation(String),
}
