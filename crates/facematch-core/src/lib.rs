//! facematch-core: Face descriptor model and nearest-identity matching.
//!
//! Descriptors come from an external embedding model behind
//! [`EmbeddingExtractor`]; this crate decides which enrolled identity, if any,
//! a descriptor belongs to. Persistence lives in `facematch-store`.

pub mod codec;
pub mod error;
pub mod extractor;
pub mod matcher;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use extractor::{EmbeddingExtractor, ExtractionError};
pub use matcher::{confidence_from_distance, EuclideanMatcher, Matcher};
pub use types::{Descriptor, IdentityRecord, MatchAttempt, MatchResult, UNKNOWN_NAME};
