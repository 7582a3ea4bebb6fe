use netprune_core::TensorError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, transforming or batching samples.
#[derive(Debug, Error)]
pub enum DataError {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{dataset} files not found under {path:?} and download is disabled")]
    MissingFiles { dataset: String, path: PathBuf },

    #[error("Corrupt data in {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Unknown dataset {0:?}")]
    UnknownDataset(String),

    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    #[error("Invalid loader configuration: {0}")]
    InvalidConfig(String),

    #[error("Loader worker failed: {0}")]
    Worker(String),
}

pub type DataResult<T> = Result<T, DataError>;
