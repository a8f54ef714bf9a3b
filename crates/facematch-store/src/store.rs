//! Durable store of enrolled identities and their descriptors.

use chrono::{DateTime, Utc};
use facematch_core::{codec, Descriptor, Error, IdentityRecord, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::Database;

const DIMENSION_KEY: &str = "dimension";

/// Enrolled identities, keyed by a store-assigned, monotonically increasing id.
///
/// The descriptor dimension D is either configured up front or fixed by the
/// first enrollment, and is persisted with the data so it holds across restarts
/// and after every identity has been deleted.
#[derive(Clone)]
pub struct DescriptorStore {
    db: Database,
}

impl DescriptorStore {
    /// Attach to `db`, optionally pinning the descriptor dimension.
    ///
    /// Fails with a validation error when `dimension` conflicts with the
    /// dimension already recorded in the database.
    pub async fn new(db: Database, dimension: Option<usize>) -> Result<Self> {
        if let Some(dim) = dimension {
            if dim == 0 {
                return Err(Error::Validation("descriptor dimension must be positive".into()));
            }
            db.call(move |conn| {
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(Error::storage)?;
                match read_dimension(&tx)? {
                    Some(stored) if stored != dim => {
                        return Err(Error::Validation(format!(
                            "configured dimension {dim} conflicts with stored dimension {stored}"
                        )));
                    }
                    Some(_) => {}
                    None => write_dimension(&tx, dim)?,
                }
                tx.commit().map_err(Error::storage)
            })
            .await?;
        }
        Ok(Self { db })
    }

    /// Enroll `descriptor` under `name`, returning the new identity's id.
    pub async fn enroll(
        &self,
        name: &str,
        descriptor: Descriptor,
        source_reference: &str,
    ) -> Result<i64> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation("name must not be empty".into()));
        }
        descriptor.validate(None)?;

        let source_reference = source_reference.to_string();
        let dim = descriptor.dimension();
        let blob = codec::encode(&descriptor);
        let enrolled_at = Utc::now();

        let log_name = name.clone();
        let id = self
            .db
            .call(move |conn| {
                // Immediate: two concurrent first enrollments must not both fix D.
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(Error::storage)?;
                let stored = read_dimension(&tx)?;
                descriptor.validate(stored)?;
                if stored.is_none() {
                    write_dimension(&tx, dim)?;
                }
                tx.execute(
                    "INSERT INTO identities
                         (name, descriptor, dimension, enrolled_at, source_reference)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![name, blob, dim as i64, enrolled_at, source_reference],
                )
                .map_err(Error::storage)?;
                let id = tx.last_insert_rowid();
                tx.commit().map_err(Error::storage)?;
                Ok(id)
            })
            .await?;

        tracing::info!(id, name = %log_name, dimension = dim, "identity enrolled");
        Ok(id)
    }

    /// All enrolled identities in enrollment order.
    pub async fn list_all(&self) -> Result<Vec<IdentityRecord>> {
        self.db
            .call(|conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, name, descriptor, enrolled_at, source_reference
                         FROM identities ORDER BY id",
                    )
                    .map_err(Error::storage)?;
                let rows = stmt
                    .query_map([], RawIdentity::from_row)
                    .map_err(Error::storage)?;
                let mut records = Vec::new();
                for row in rows {
                    records.push(row.map_err(Error::storage)?.into_record()?);
                }
                Ok(records)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<IdentityRecord> {
        let raw = self
            .db
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, name, descriptor, enrolled_at, source_reference
                     FROM identities WHERE id = ?1",
                    [id],
                    RawIdentity::from_row,
                )
                .optional()
                .map_err(Error::storage)
            })
            .await?;
        raw.ok_or(Error::NotFound { id })?.into_record()
    }

    /// Remove an identity. Recognition history that names it is untouched.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let removed = self
            .db
            .call(move |conn| {
                conn.execute("DELETE FROM identities WHERE id = ?1", [id])
                    .map_err(Error::storage)
            })
            .await?;
        if removed == 0 {
            return Err(Error::NotFound { id });
        }
        tracing::info!(id, "identity deleted");
        Ok(true)
    }

    pub async fn count(&self) -> Result<u64> {
        self.db
            .call(|conn| {
                conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get::<_, i64>(0))
                    .map(|n| n as u64)
                    .map_err(Error::storage)
            })
            .await
    }

    /// Established descriptor dimension, if any.
    pub async fn dimension(&self) -> Result<Option<usize>> {
        self.db.call(|conn| read_dimension(conn)).await
    }
}

fn read_dimension(conn: &Connection) -> Result<Option<usize>> {
    let value: Option<i64> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = ?1",
            [DIMENSION_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::storage)?;
    value
        .map(|v| {
            usize::try_from(v).map_err(|_| Error::storage(format!("corrupt stored dimension {v}")))
        })
        .transpose()
}

fn write_dimension(conn: &Connection, dim: usize) -> Result<()> {
    conn.execute(
        "INSERT INTO store_meta (key, value) VALUES (?1, ?2)",
        params![DIMENSION_KEY, dim as i64],
    )
    .map_err(Error::storage)?;
    Ok(())
}

/// Row as read from SQLite, before descriptor decoding.
struct RawIdentity {
    id: i64,
    name: String,
    descriptor: Vec<u8>,
    enrolled_at: DateTime<Utc>,
    source_reference: String,
}

impl RawIdentity {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            descriptor: row.get(2)?,
            enrolled_at: row.get(3)?,
            source_reference: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<IdentityRecord> {
        let descriptor = codec::decode(&self.descriptor).map_err(Error::storage)?;
        Ok(IdentityRecord {
            id: self.id,
            name: self.name,
            descriptor,
            enrolled_at: self.enrolled_at,
            source_reference: self.source_reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecognitionLedger;
    use facematch_core::ErrorKind;

    async fn store() -> DescriptorStore {
        let db = Database::open_in_memory().await.unwrap();
        DescriptorStore::new(db, None).await.unwrap()
    }

    #[tokio::test]
    async fn test_enroll_and_list() {
        let store = store().await;
        let id = store
            .enroll("Alice", Descriptor::new(vec![0.1, 0.2, 0.3]), "alice.jpg")
            .await
            .unwrap();

        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].name, "Alice");
        assert_eq!(records[0].descriptor.values, vec![0.1, 0.2, 0.3]);
        assert_eq!(records[0].source_reference, "alice.jpg");
    }

    #[tokio::test]
    async fn test_descriptor_precision_survives_storage() {
        let store = store().await;
        let values = vec![1.0 / 3.0, -0.0, f32::MIN_POSITIVE / 4.0, 123.456_79, -1e-30];
        store
            .enroll("Precise", Descriptor::new(values.clone()), "p.jpg")
            .await
            .unwrap();

        let stored = &store.list_all().await.unwrap()[0].descriptor.values;
        let stored_bits: Vec<u32> = stored.iter().map(|v| v.to_bits()).collect();
        let original_bits: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(stored_bits, original_bits);
    }

    #[tokio::test]
    async fn test_ids_increase_and_list_in_enrollment_order() {
        let store = store().await;
        let a = store.enroll("a", Descriptor::new(vec![1.0]), "a").await.unwrap();
        let b = store.enroll("b", Descriptor::new(vec![2.0]), "b").await.unwrap();
        store.delete(b).await.unwrap();
        let c = store.enroll("c", Descriptor::new(vec![3.0]), "c").await.unwrap();

        assert!(a < b && b < c, "ids must never be reused: {a} {b} {c}");
        let names: Vec<String> =
            store.list_all().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_first_enrollment_fixes_dimension() {
        let store = store().await;
        assert_eq!(store.dimension().await.unwrap(), None);

        store.enroll("a", Descriptor::new(vec![0.1, 0.2, 0.3]), "a").await.unwrap();
        assert_eq!(store.dimension().await.unwrap(), Some(3));

        let err = store
            .enroll("b", Descriptor::new(vec![0.1, 0.2]), "b")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_outlives_deleted_identities() {
        let store = store().await;
        let id = store.enroll("a", Descriptor::new(vec![0.1, 0.2]), "a").await.unwrap();
        store.delete(id).await.unwrap();

        let err = store
            .enroll("b", Descriptor::new(vec![0.1, 0.2, 0.3]), "b")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_configured_dimension() {
        let db = Database::open_in_memory().await.unwrap();
        let store = DescriptorStore::new(db.clone(), Some(4)).await.unwrap();
        assert_eq!(store.dimension().await.unwrap(), Some(4));

        let err = store
            .enroll("a", Descriptor::new(vec![0.1, 0.2, 0.3]), "a")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Reattaching with a conflicting dimension is rejected
        let err = DescriptorStore::new(db.clone(), Some(8)).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(DescriptorStore::new(db, Some(4)).await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_dimension_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let err = DescriptorStore::new(db, Some(0)).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_enroll_rejects_bad_input() {
        let store = store().await;
        for (name, values) in [
            ("   ", vec![0.1]),
            ("a", vec![]),
            ("a", vec![f32::NAN]),
        ] {
            let err = store.enroll(name, Descriptor::new(values), "x").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert_eq!(store.count().await.unwrap(), 0);
        // A rejected enrollment must not fix the dimension
        assert_eq!(store.dimension().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get() {
        let store = store().await;
        let id = store.enroll("Alice", Descriptor::new(vec![0.5]), "a.jpg").await.unwrap();
        assert_eq!(store.get(id).await.unwrap().name, "Alice");
        assert_eq!(store.get(id + 1).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let store = store().await;
        let err = store.delete(99).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { id: 99 }));
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let store = store().await;
        let id = store.enroll("a", Descriptor::new(vec![0.5]), "a").await.unwrap();
        assert!(store.delete(id).await.unwrap());
        assert_eq!(store.delete(id).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_closed_database_is_transient_storage_error() {
        let db = Database::open_in_memory().await.unwrap();
        let store = DescriptorStore::new(db.clone(), None).await.unwrap();
        let ledger = RecognitionLedger::new(db.clone());
        store.enroll("a", Descriptor::new(vec![0.5]), "a").await.unwrap();
        db.close().await.unwrap();

        let errors = [
            store.enroll("b", Descriptor::new(vec![0.5]), "b").await.unwrap_err(),
            store.list_all().await.unwrap_err(),
            store.delete(1).await.unwrap_err(),
            ledger.record("a", 50.0, true).await.unwrap_err(),
            ledger.query(5).await.unwrap_err(),
        ];
        for err in errors {
            assert_eq!(err.kind(), ErrorKind::Storage, "{err}");
            assert!(err.is_transient());
        }
    }

    #[tokio::test]
    async fn test_delete_leaves_ledger_untouched() {
        let db = Database::open_in_memory().await.unwrap();
        let store = DescriptorStore::new(db.clone(), None).await.unwrap();
        let ledger = RecognitionLedger::new(db);

        let id = store.enroll("X", Descriptor::new(vec![0.1, 0.2]), "x.jpg").await.unwrap();
        ledger.record("X", 98.0, true).await.unwrap();
        let before = ledger.query(10).await.unwrap();

        store.delete(id).await.unwrap();

        assert!(store.list_all().await.unwrap().is_empty());
        assert_eq!(ledger.query(10).await.unwrap(), before);
    }
}
