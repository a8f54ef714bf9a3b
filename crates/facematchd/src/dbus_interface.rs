use std::path::Path;

use chrono::{DateTime, Utc};
use facematch_core::{ErrorKind, IdentityRecord, MatchResult};
use serde::Serialize;
use zbus::{interface, DBusError};

use crate::engine::{Engine, EngineStatus};
use crate::extractor::CommandExtractor;

pub const BUS_NAME: &str = "org.freedesktop.FaceMatch1";
pub const OBJECT_PATH: &str = "/org/freedesktop/FaceMatch1";

/// Errors as seen on the bus, one name per failure kind so clients can tell
/// retryable failures (`Storage`, `Extraction`) from bad input.
#[derive(Debug, DBusError)]
#[zbus(prefix = "org.freedesktop.FaceMatch1.Error")]
pub enum ServiceError {
    #[zbus(error)]
    ZBus(zbus::Error),
    Validation(String),
    NoFaceDetected(String),
    AmbiguousInput(String),
    NotFound(String),
    Extraction(String),
    Storage(String),
}

impl From<facematch_core::Error> for ServiceError {
    fn from(err: facematch_core::Error) -> Self {
        let msg = err.to_string();
        match err.kind() {
            ErrorKind::Validation => ServiceError::Validation(msg),
            ErrorKind::NoFaceDetected => ServiceError::NoFaceDetected(msg),
            ErrorKind::AmbiguousInput => ServiceError::AmbiguousInput(msg),
            ErrorKind::NotFound => ServiceError::NotFound(msg),
            ErrorKind::Extraction => ServiceError::Extraction(msg),
            ErrorKind::Storage => ServiceError::Storage(msg),
        }
    }
}

/// Identity as listed to clients. The raw descriptor stays in the daemon.
#[derive(Debug, Serialize)]
struct IdentitySummary {
    id: i64,
    name: String,
    dimension: usize,
    enrolled_at: DateTime<Utc>,
    source_reference: String,
}

impl From<IdentityRecord> for IdentitySummary {
    fn from(record: IdentityRecord) -> Self {
        Self {
            id: record.id,
            dimension: record.descriptor.dimension(),
            name: record.name,
            enrolled_at: record.enrolled_at,
            source_reference: record.source_reference,
        }
    }
}

/// Per-face recognition outcome as returned to clients.
#[derive(Debug, Serialize)]
struct FaceReport {
    name: String,
    identity_id: Option<i64>,
    /// `None` when nothing is enrolled (infinite distance).
    distance: Option<f32>,
    confidence: f32,
    matched: bool,
}

impl From<&MatchResult> for FaceReport {
    fn from(result: &MatchResult) -> Self {
        Self {
            name: result.ledger_name().to_string(),
            identity_id: result.best_identity.as_ref().map(|r| r.id),
            distance: result.distance.is_finite().then_some(result.distance),
            confidence: result.confidence,
            matched: result.matched,
        }
    }
}

/// Daemon status as returned to clients.
#[derive(Debug, Serialize)]
struct StatusReport {
    version: &'static str,
    #[serde(flatten)]
    engine: EngineStatus,
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ServiceError> {
    serde_json::to_string(value)
        .map_err(|e| ServiceError::ZBus(zbus::Error::Failure(e.to_string())))
}

/// Threshold requested over the bus. Negative selects the configured default;
/// anything else, NaN included, is passed on for validation.
fn requested_threshold(threshold: f64) -> Option<f32> {
    if threshold < 0.0 {
        None
    } else {
        Some(threshold as f32)
    }
}

/// D-Bus interface for the facematch daemon.
///
/// Bus name: org.freedesktop.FaceMatch1
/// Object path: /org/freedesktop/FaceMatch1
pub struct FaceMatchService {
    engine: Engine<CommandExtractor>,
}

impl FaceMatchService {
    pub fn new(engine: Engine<CommandExtractor>) -> Self {
        Self { engine }
    }
}

#[interface(name = "org.freedesktop.FaceMatch1")]
impl FaceMatchService {
    /// Enroll the single face in `image` under `name`. Returns the identity id.
    async fn enroll(&self, name: &str, image: &str) -> Result<i64, ServiceError> {
        tracing::info!(name, image, "enroll requested");
        let record = self.engine.enroll(name, Path::new(image)).await?;
        Ok(record.id)
    }

    /// Recognize every face in `image`. A negative `threshold` selects the
    /// configured default. Returns a JSON array with one entry per face.
    async fn recognize(&self, image: &str, threshold: f64) -> Result<String, ServiceError> {
        tracing::info!(image, threshold, "recognize requested");
        let threshold = requested_threshold(threshold);
        let results = self.engine.recognize(Path::new(image), threshold).await?;
        let reports: Vec<FaceReport> = results.iter().map(FaceReport::from).collect();
        to_json(&reports)
    }

    /// List enrolled identities as JSON.
    async fn list_identities(&self) -> Result<String, ServiceError> {
        let identities: Vec<IdentitySummary> = self
            .engine
            .list_identities()
            .await?
            .into_iter()
            .map(IdentitySummary::from)
            .collect();
        to_json(&identities)
    }

    /// Most recent recognition attempts as JSON, newest first.
    async fn history(&self, limit: u32) -> Result<String, ServiceError> {
        let attempts = self.engine.history(limit as usize).await?;
        to_json(&attempts)
    }

    /// Remove an enrolled identity by id.
    async fn remove_identity(&self, id: i64) -> Result<bool, ServiceError> {
        tracing::info!(id, "remove_identity requested");
        Ok(self.engine.delete_identity(id).await?)
    }

    /// Return daemon status information.
    async fn status(&self) -> Result<String, ServiceError> {
        to_json(&StatusReport {
            version: env!("CARGO_PKG_VERSION"),
            engine: self.engine.status().await?,
        })
    }
}
