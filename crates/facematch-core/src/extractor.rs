//! Boundary to the external face embedding model.

use std::path::Path;

use thiserror::Error;

use crate::types::Descriptor;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("image {path} is unreadable: {reason}")]
    UnreadableImage { path: String, reason: String },
    #[error("extractor failed: {0}")]
    Failed(String),
    #[error("extractor output is malformed: {0}")]
    MalformedOutput(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of face descriptors for an image.
///
/// Implementations detect every face in the image and return one descriptor
/// per face, in any order. Zero faces is `Ok(vec![])`, not an error.
/// Extraction is blocking work; async callers should move it off the runtime.
pub trait EmbeddingExtractor: Send + Sync {
    fn extract(&self, image: &Path) -> Result<Vec<Descriptor>, ExtractionError>;
}
