use netprune_data::DataError;
use netprune_io::IoError;
use netprune_preprocessing::SplitError;
use thiserror::Error;

/// Errors surfaced while configuring the manager or preparing loaders.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type PrepareResult<T> = Result<T, PrepareError>;
