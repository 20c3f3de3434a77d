//! Common error types for the MOS rater

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for MOS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and the service
#[derive(Error, Debug)]
pub enum Error {
    /// Audio folder could not be read
    #[error("Audio folder unavailable: {path}: {source}")]
    CatalogUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Audio folder contains no supported files
    #[error(
        "No audio files found in '{0}'. Please add some .wav, .mp3, or .ogg files and refresh."
    )]
    EmptyCatalog(PathBuf),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors the operator has to fix outside the application
    /// (missing files, missing credentials).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::CatalogUnavailable { .. } | Error::EmptyCatalog(_) | Error::Config(_)
        )
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Internal(format!("CSV encoding failed: {}", err))
    }
}
