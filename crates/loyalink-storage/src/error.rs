use sea_orm::{DbErr, SqlErr};

/// Errors returned by [`crate::RegistrationStore`].
///
/// # Examples
///
/// ```rust
/// use loyalink_storage::error::StorageError;
///
/// let err = StorageError::NotFound { entity: "token_usage" };
/// assert!(err.to_string().contains("token_usage"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The token collides with an already issued one. Retry with a fresh token.
    #[error("Storage: registration token already exists")]
    DuplicateToken,

    /// No row matches the requested token.
    #[error("Storage: {entity} not found")]
    NotFound { entity: &'static str },

    /// The token was consumed by an earlier `mark_used`.
    #[error("Storage: registration token already used")]
    AlreadyUsed,

    /// An underlying database error.
    #[error("Storage: database error: {0}")]
    Database(#[from] DbErr),
}

impl StorageError {
    /// Maps a unique-constraint violation to `on_unique`, everything else to `Database`.
    pub(crate) fn from_write(err: DbErr, on_unique: StorageError) -> StorageError {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => on_unique,
            _ => StorageError::Database(err),
        }
    }
}

/// Errors returned by [`crate::codec::TokenCodec`].
///
/// Every decoding or authentication failure collapses into `InvalidToken` so
/// callers cannot tell a malformed link from a forged one.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Codec: invalid token")]
    InvalidToken,

    #[error("Codec: invalid encryption key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Codec: system random generator failed")]
    Rng,

    #[error("Codec: encryption failed")]
    Seal,

    #[error("Codec: key file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
