//! Append-only audit log of recognition attempts.
//!
//! Entries name identities by string only, so history stays intact when an
//! identity is later deleted. The schema rejects UPDATE and DELETE on the
//! table; this type exposes neither.

use chrono::Utc;
use facematch_core::{Error, MatchAttempt, Result};
use rusqlite::params;

use crate::db::Database;

#[derive(Clone)]
pub struct RecognitionLedger {
    db: Database,
}

impl RecognitionLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append one attempt and return its id.
    pub async fn record(&self, matched_name: &str, confidence: f32, matched: bool) -> Result<i64> {
        if !(0.0..=100.0).contains(&confidence) {
            return Err(Error::Validation(format!(
                "confidence {confidence} outside [0, 100]"
            )));
        }

        let matched_name = matched_name.to_string();
        let occurred_at = Utc::now();
        let id = self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO recognition_log (matched_name, confidence, matched, occurred_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![matched_name, f64::from(confidence), matched, occurred_at],
                )
                .map_err(Error::storage)?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        tracing::debug!(id, confidence, matched, "recognition attempt recorded");
        Ok(id)
    }

    /// The `limit` most recent attempts, newest first.
    pub async fn query(&self, limit: usize) -> Result<Vec<MatchAttempt>> {
        if limit == 0 {
            return Err(Error::Validation("history limit must be positive".into()));
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.db
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, matched_name, confidence, matched, occurred_at
                         FROM recognition_log ORDER BY id DESC LIMIT ?1",
                    )
                    .map_err(Error::storage)?;
                let rows = stmt
                    .query_map([limit], |row| {
                        Ok(MatchAttempt {
                            id: row.get(0)?,
                            matched_name: row.get(1)?,
                            confidence: row.get::<_, f64>(2)? as f32,
                            matched: row.get(3)?,
                            occurred_at: row.get(4)?,
                        })
                    })
                    .map_err(Error::storage)?;
                let attempts = rows
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(Error::storage)?;
                Ok(attempts)
            })
            .await
    }

    pub async fn count(&self) -> Result<u64> {
        self.db
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM recognition_log", [], |row| {
                    row.get::<_, i64>(0)
                })
                .map(|n| n as u64)
                .map_err(Error::storage)
            })
            .await
    }
}
