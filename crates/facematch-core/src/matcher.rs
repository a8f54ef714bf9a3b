//! Nearest-identity matching.
//!
//! Confidence is a linear rescaling of Euclidean distance onto [0, 100]. It is
//! a display heuristic, not a calibrated probability, and is not tuned to any
//! particular embedding model.

use crate::types::{Descriptor, IdentityRecord, MatchResult};

/// Strategy for comparing a query descriptor against the enrolled set.
///
/// Implementations must be pure: the same inputs give the same result, and
/// when several candidates are equally near, the first in `enrolled` order wins.
pub trait Matcher: Send + Sync {
    fn compare(
        &self,
        query: &Descriptor,
        enrolled: &[IdentityRecord],
        threshold: f32,
    ) -> MatchResult;
}

/// Map a distance onto the confidence scale: `100 - 100·d`, clamped to [0, 100].
pub fn confidence_from_distance(distance: f32) -> f32 {
    if !distance.is_finite() {
        return 0.0;
    }
    (100.0 - distance * 100.0).clamp(0.0, 100.0)
}

/// Exhaustive linear scan, O(N·D) per query.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(
        &self,
        query: &Descriptor,
        enrolled: &[IdentityRecord],
        threshold: f32,
    ) -> MatchResult {
        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        // Strict `<` keeps the first of equally distant candidates.
        for (i, record) in enrolled.iter().enumerate() {
            let dist = query.euclidean_distance(&record.descriptor);
            if best_idx.is_none() || dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) => MatchResult {
                best_identity: Some(enrolled[idx].clone()),
                distance: best_dist,
                confidence: confidence_from_distance(best_dist),
                matched: best_dist < threshold,
            },
            None => MatchResult::no_candidates(),
        }
    }
}
