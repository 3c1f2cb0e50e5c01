use custody_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Stored bytes exist but cannot be read back.
    #[error("cannot decode cached blob '{id}': {reason}")]
    Decode { id: String, reason: String },

    #[error("cannot encode blob '{0}'")]
    Encode(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Storage
    }
}

impl From<heed::Error> for CacheError {
    fn from(e: heed::Error) -> Self {
        Self::Backend(e.to_string())
    }
}
