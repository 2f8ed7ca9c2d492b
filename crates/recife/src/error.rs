//! Error type for pipeline runs.

use recife_data::DataError;
use recife_transform::TransformError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration file could not be read
    #[error("Config IO error: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration values are inconsistent
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Warehouse error
    #[error(transparent)]
    Data(DataError),

    /// Stage error
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Another run holds the run lock
    #[error("Concurrent run: lock held by {owner} since {acquired_at}")]
    Concurrency {
        /// Owner recorded by the holder
        owner: String,
        /// When the holder acquired the lock
        acquired_at: String,
    },
}

impl From<DataError> for PipelineError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::LockHeld {
                owner, acquired_at, ..
            } => Self::Concurrency { owner, acquired_at },
            other => Self::Data(other),
        }
    }
}

impl PipelineError {
    /// Whether the run failed on a join-integrity check.
    pub const fn is_join_integrity(&self) -> bool {
        match self {
            Self::Transform(e) => e.is_join_integrity(),
            _ => false,
        }
    }
}
