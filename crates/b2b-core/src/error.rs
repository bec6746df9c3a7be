//! Error types for bid2build.

use thiserror::Error;

/// Result type alias using bid2build's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for store, blob and identity operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Customer record not found for this owner
    #[error("Customer not found: {0}")]
    CustomerNotFound(uuid::Uuid),

    /// No owner identity is present
    #[error("Store unavailable: no signed-in owner")]
    StoreUnavailable,

    /// A write would leave a record with more pictures than allowed
    #[error("Too many pictures: {count} exceeds maximum of {max}")]
    TooManyPictures { count: usize, max: usize },

    /// Blob upload failed
    #[error("Upload error: {0}")]
    Upload(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Provider-specific error code suitable for support tickets.
    ///
    /// Returns the PostgreSQL SQLSTATE for database errors and `None` otherwise.
    pub fn provider_code(&self) -> Option<String> {
        match self {
            Error::Database(e) => e
                .as_database_error()
                .and_then(|db| db.code())
                .map(|code| code.into_owned()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
