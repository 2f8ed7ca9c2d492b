//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Another run holds the pipeline lock
    #[error("Run lock '{name}' is held by {owner} since {acquired_at}")]
    LockHeld {
        /// Lock name
        name: String,
        /// Owner recorded by the holder
        owner: String,
        /// When the holder acquired the lock
        acquired_at: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DataError::LockHeld {
            name: "pipeline".to_string(),
            owner: "recife-42".to_string(),
            acquired_at: "2024-03-05T02:00:00+00:00".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Run lock 'pipeline' is held by recife-42 since 2024-03-05T02:00:00+00:00"
        );

        let err = DataError::Parse("line 3: invalid date 'x'".to_string());
        assert!(err.to_string().starts_with("Data parsing error"));
    }
}
