use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving, opening or reading a corpus.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("path is neither a file nor a directory: {0:?}")]
    InvalidPath(PathBuf),

    #[error("malformed data in {path:?}: {message}")]
    Format { path: PathBuf, message: String },

    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tensor conversion failed: {0}")]
    Tensor(String),
}

impl DatasetError {
    pub(crate) fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        DatasetError::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DatasetError>;
