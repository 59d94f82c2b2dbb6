use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Server(#[from] ProviderError),

    /// A decision produced nothing to apply (empty pool, empty sequence,
    /// schedule without category).
    #[error("Invalid state: {0}")]
    State(String),

    /// Apply suppressed by an override window or passive mode.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // Map "no rows" to NotFound
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                // SQLite reports constraint failures in the message text
                if message.contains("UNIQUE constraint failed") {
                    Error::AlreadyExists("Resource already exists".to_string())
                } else if message.contains("FOREIGN KEY constraint failed") {
                    Error::NotFound("Referenced resource not found".to_string())
                } else if message.contains("CHECK constraint failed")
                    || message.contains("NOT NULL constraint failed")
                {
                    Error::InvalidInput("Constraint check failed".to_string())
                } else {
                    Error::Database(err)
                }
            }
            _ => Error::Database(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
