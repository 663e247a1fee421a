use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid digest: {0}")]
    InvalidDigest(#[from] maildisk_types::TypeError),

    #[error("store error: {0}")]
    Store(#[from] maildisk_store::StoreError),

    #[error("index error: {0}")]
    Index(#[from] maildisk_index::IndexError),
}

impl From<maildisk_store::BackendError> for SdkError {
    fn from(err: maildisk_store::BackendError) -> Self {
        SdkError::Store(err.into())
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
