use thiserror::Error;

use crate::extractor::ExtractionError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the store, ledger and orchestrator.
///
/// Nothing here is retried internally; see [`Error::is_transient`] for which
/// kinds a caller may reasonably retry.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("expected exactly one face, detected {faces}")]
    AmbiguousInput { faces: usize },
    #[error("identity {id} not found")]
    NotFound { id: i64 },
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Field-less discriminant of [`Error`], stable across the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NoFaceDetected,
    AmbiguousInput,
    NotFound,
    Extraction,
    Storage,
}

impl Error {
    pub fn storage(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Storage(err.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NoFaceDetected => ErrorKind::NoFaceDetected,
            Error::AmbiguousInput { .. } => ErrorKind::AmbiguousInput,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Extraction(_) => ErrorKind::Extraction,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Storage and extraction failures may succeed on retry; everything else
    /// is a problem with the caller's input.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Storage | ErrorKind::Extraction)
    }
}
