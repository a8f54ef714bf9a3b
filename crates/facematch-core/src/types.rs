use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Name recorded in the ledger when no enrolled identity matched.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Face descriptor: a fixed-length embedding produced by the external extractor
/// (typically 128-dimensional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two descriptors.
    ///
    /// Descriptors are expected to share a dimension (see [`validate`](Self::validate)).
    /// When they don't, only the common leading components are compared.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Check that the descriptor is usable for enrollment or matching.
    ///
    /// Rejects empty and non-finite vectors, and vectors whose dimension differs
    /// from `expected` when one is given.
    pub fn validate(&self, expected: Option<usize>) -> Result<(), Error> {
        if self.values.is_empty() {
            return Err(Error::Validation("descriptor is empty".into()));
        }
        if let Some(i) = self.values.iter().position(|v| !v.is_finite()) {
            return Err(Error::Validation(format!(
                "descriptor component {i} is not finite"
            )));
        }
        match expected {
            Some(dim) if dim != self.values.len() => Err(Error::Validation(format!(
                "descriptor has {} dimensions, store expects {dim}",
                self.values.len()
            ))),
            _ => Ok(()),
        }
    }
}

impl From<Vec<f32>> for Descriptor {
    fn from(values: Vec<f32>) -> Self {
        Self { values }
    }
}

/// An enrolled identity, as held by the descriptor store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub id: i64,
    pub name: String,
    pub descriptor: Descriptor,
    pub enrolled_at: DateTime<Utc>,
    /// Image reference the descriptor was extracted from.
    pub source_reference: String,
}

/// One row of the recognition ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAttempt {
    pub id: i64,
    /// Name of the matched identity, or [`UNKNOWN_NAME`].
    pub matched_name: String,
    /// Heuristic confidence in [0, 100].
    pub confidence: f32,
    pub matched: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Result of matching one query descriptor against the enrolled set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Nearest enrolled identity, whether or not it passed the threshold.
    pub best_identity: Option<IdentityRecord>,
    /// Euclidean distance to `best_identity`; `+inf` when nothing is enrolled.
    pub distance: f32,
    /// Heuristic confidence in [0, 100]. Not a probability.
    pub confidence: f32,
    pub matched: bool,
}

impl MatchResult {
    /// Result for an empty enrolled set.
    pub fn no_candidates() -> Self {
        Self {
            best_identity: None,
            distance: f32::INFINITY,
            confidence: 0.0,
            matched: false,
        }
    }

    /// Name to record in the ledger for this outcome.
    pub fn ledger_name(&self) -> &str {
        match &self.best_identity {
            Some(identity) if self.matched => &identity.name,
            _ => UNKNOWN_NAME,
        }
    }
}
