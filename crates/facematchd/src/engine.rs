use std::path::Path;
use std::sync::Arc;

use facematch_core::{
    Descriptor, EmbeddingExtractor, Error, EuclideanMatcher, ExtractionError, IdentityRecord,
    MatchAttempt, MatchResult, Matcher, Result,
};
use facematch_store::{DescriptorStore, RecognitionLedger};
use serde::Serialize;

/// Snapshot of engine state for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub identities: u64,
    pub dimension: Option<usize>,
    pub recognition_attempts: u64,
    pub default_threshold: f32,
}

/// Enrollment and recognition orchestrator.
///
/// Runs extractor output through the matcher against the store and records
/// every recognition outcome in the ledger. Requests are independent; the only
/// shared state is the database behind the store and ledger.
pub struct Engine<E, M = EuclideanMatcher> {
    extractor: Arc<E>,
    matcher: M,
    store: DescriptorStore,
    ledger: RecognitionLedger,
    default_threshold: f32,
}

impl<E, M> Engine<E, M>
where
    E: EmbeddingExtractor + 'static,
    M: Matcher,
{
    pub fn new(
        extractor: E,
        matcher: M,
        store: DescriptorStore,
        ledger: RecognitionLedger,
        default_threshold: f32,
    ) -> Self {
        Self {
            extractor: Arc::new(extractor),
            matcher,
            store,
            ledger,
            default_threshold,
        }
    }

    /// Extract the single face in `image` and enroll it under `name`.
    ///
    /// Returns the identity as stored.
    pub async fn enroll(&self, name: &str, image: &Path) -> Result<IdentityRecord> {
        let mut descriptors = self.extract(image).await?;
        let descriptor = match descriptors.len() {
            0 => return Err(Error::NoFaceDetected),
            1 => descriptors.remove(0),
            faces => {
                tracing::info!(faces, image = %image.display(), "enroll: rejected ambiguous image");
                return Err(Error::AmbiguousInput { faces });
            }
        };

        let id = self
            .store
            .enroll(name, descriptor, &image.to_string_lossy())
            .await?;
        self.store.get(id).await
    }

    /// Match every face in `image` against the enrolled set.
    ///
    /// Each face's outcome is written to the ledger before its result is
    /// returned. A ledger failure aborts the remaining faces; entries already
    /// written for earlier faces stay.
    pub async fn recognize(
        &self,
        image: &Path,
        threshold: Option<f32>,
    ) -> Result<Vec<MatchResult>> {
        let threshold = threshold.unwrap_or(self.default_threshold);
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(Error::Validation(format!(
                "threshold must be a non-negative number, got {threshold}"
            )));
        }

        let descriptors = self.extract(image).await?;
        if descriptors.is_empty() {
            return Err(Error::NoFaceDetected);
        }

        // Fresh per request: enrollments committed before now are visible.
        let enrolled = self.store.list_all().await?;
        let dimension = self.store.dimension().await?;
        for descriptor in &descriptors {
            descriptor.validate(dimension)?;
        }

        let mut results = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let result = self.matcher.compare(descriptor, &enrolled, threshold);
            self.ledger
                .record(result.ledger_name(), result.confidence, result.matched)
                .await?;
            tracing::debug!(
                name = result.ledger_name(),
                distance = result.distance,
                confidence = result.confidence,
                matched = result.matched,
                "recognize: face compared"
            );
            results.push(result);
        }

        tracing::info!(
            faces = results.len(),
            matched = results.iter().filter(|r| r.matched).count(),
            enrolled = enrolled.len(),
            threshold,
            "recognize: complete"
        );
        Ok(results)
    }

    pub async fn list_identities(&self) -> Result<Vec<IdentityRecord>> {
        self.store.list_all().await
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<MatchAttempt>> {
        self.ledger.query(limit).await
    }

    pub async fn delete_identity(&self, id: i64) -> Result<bool> {
        self.store.delete(id).await
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        Ok(EngineStatus {
            identities: self.store.count().await?,
            dimension: self.store.dimension().await?,
            recognition_attempts: self.ledger.count().await?,
            default_threshold: self.default_threshold,
        })
    }

    /// Run the extractor off the async runtime. No retries.
    async fn extract(&self, image: &Path) -> Result<Vec<Descriptor>> {
        let extractor = Arc::clone(&self.extractor);
        let path = image.to_path_buf();
        let descriptors = tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| ExtractionError::Failed(format!("extractor task failed: {e}")))??;
        Ok(descriptors)
    }
}
