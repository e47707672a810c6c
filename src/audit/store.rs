//! Audit store backends.
//!
//! Every backend must refuse to overwrite an existing
//! `(partition_key, sort_key)` pair; a collision is reported as
//! `Error::AuditWrite`.

use std::collections::BTreeMap;

use batchflow_common::{Error, Result};
use batchflow_store::pool::{self, DbPool};
use batchflow_store::queries::audit_records;
use parking_lot::Mutex;

use super::record::AuditRecord;

/// Append-only sink for audit records.
#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<()>;
}

/// Keeps records in process memory.
#[derive(Default)]
pub struct MemoryAuditStore {
    records: Mutex<BTreeMap<(String, String), AuditRecord>>,
    unavailable: Option<String>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses every write with `reason`.
    ///
    /// Stands in for a configured backend that could not be opened, so the
    /// stage still runs and reports the gaps.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            records: Mutex::default(),
            unavailable: Some(reason.into()),
        }
    }

    /// All records, ordered by partition then sort key.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        if let Some(reason) = &self.unavailable {
            return Err(Error::audit_write(format!("audit store is unavailable: {}", reason)));
        }

        let key = (record.partition_key.clone(), record.sort_key.clone());
        let mut records = self.records.lock();
        if records.contains_key(&key) {
            return Err(Error::audit_write(format!(
                "Audit key already exists: {}/{}",
                key.0, key.1
            )));
        }
        records.insert(key, record.clone());
        Ok(())
    }
}

/// Writes records to a SQLite file, typically on storage shared by every job
/// of the pipeline.
pub struct SqliteAuditStore {
    pool: DbPool,
}

impl SqliteAuditStore {
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self {
            pool: pool::init_pool(path)?,
        })
    }

    /// Records of one partition, ordered by sort key.
    pub fn records(&self, partition_key: &str) -> Result<Vec<AuditRecord>> {
        let conn = pool::get_conn(&self.pool)?;
        audit_records::list_partition(&conn, partition_key)?
            .into_iter()
            .map(|row| {
                serde_json::from_value(row.item)
                    .map_err(|e| Error::database(format!("Bad audit item: {}", e)))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl AuditStore for SqliteAuditStore {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        let row = record
            .to_row()
            .map_err(|e| Error::audit_write(format!("Failed to serialize record: {}", e)))?;
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool::get_conn(&pool)?;
            audit_records::insert_record(&conn, &row)
        })
        .await
        .map_err(|e| Error::audit_write(format!("Audit write task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::record::AuditEvent;
    use assert_matches::assert_matches;
    use batchflow_common::Stage;
    use chrono::Utc;

    fn record(sort_key: &str) -> AuditRecord {
        AuditRecord {
            partition_key: "run-r1".into(),
            sort_key: sort_key.into(),
            pipeline_name: "demo".into(),
            stage: Stage::Encode,
            queue_name: "encode-q".into(),
            recorded_at: Utc::now(),
            event: AuditEvent::CombinedOutputs {
                artifact: "s3://b/encode/run-r1/video.mp4".into(),
            },
        }
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicates() {
        let store = MemoryAuditStore::new();
        store.append(&record("a")).await.unwrap();
        assert_matches!(store.append(&record("a")).await, Err(Error::AuditWrite(_)));
        store.append(&record("b")).await.unwrap();
        assert_eq!(store.records().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = MemoryAuditStore::unavailable("offline");
        assert_matches!(store.append(&record("a")).await, Err(Error::AuditWrite(_)));
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        let store = SqliteAuditStore::open(&path.to_string_lossy()).unwrap();

        store.append(&record("a")).await.unwrap();
        assert_matches!(store.append(&record("a")).await, Err(Error::AuditWrite(_)));

        let records = store.records("run-r1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sort_key, "a");
        assert_eq!(records[0].stage, Stage::Encode);
    }
}
