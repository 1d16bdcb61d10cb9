use thiserror::Error;

/// Failures reported by a [`KeyValueStorage`](crate::tally::storage::KeyValueStorage) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage quota exceeded while writing '{0}'")]
    QuotaExceeded(String),
}

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("malformed collection: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TallyError>;
