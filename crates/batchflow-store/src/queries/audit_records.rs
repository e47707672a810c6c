//! Audit record query operations.
//!
//! Rows are only ever inserted. Reading back is for external observers and
//! tests; the pipeline itself never reads its own audit trail.

use batchflow_common::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};

use crate::models::AuditRow;

/// Insert a new audit row.
///
/// Fails with [`Error::AuditWrite`] if a row with the same partition and sort
/// key already exists; an existing row is never replaced.
pub fn insert_record(conn: &Connection, row: &AuditRow) -> Result<()> {
    let item = serde_json::to_string(&row.item)
        .map_err(|e| Error::audit_write(format!("Failed to serialize audit item: {}", e)))?;

    conn.execute(
        "INSERT INTO audit_records
            (partition_key, sort_key, pipeline_name, stage, queue_name, event_kind, recorded_at, item)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            &row.partition_key,
            &row.sort_key,
            &row.pipeline_name,
            row.stage.as_str(),
            &row.queue_name,
            row.event_kind.to_string(),
            row.recorded_at.to_rfc3339(),
            item,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, _) if err.code == ErrorCode::ConstraintViolation => {
            Error::audit_write(format!(
                "Audit key already exists: {}/{}",
                row.partition_key, row.sort_key
            ))
        }
        _ => Error::database(e.to_string()),
    })?;

    Ok(())
}

/// List every row in a partition, ordered by sort key.
pub fn list_partition(conn: &Connection, partition_key: &str) -> Result<Vec<AuditRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT partition_key, sort_key, pipeline_name, stage, queue_name, event_kind,
                    recorded_at, item
             FROM audit_records WHERE partition_key = ? ORDER BY sort_key",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let raw = stmt
        .query_map([partition_key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    raw.into_iter()
        .map(
            |(partition_key, sort_key, pipeline_name, stage, queue_name, event_kind, recorded_at, item)|
             -> Result<AuditRow> {
                Ok(AuditRow {
                    partition_key,
                    sort_key,
                    pipeline_name,
                    stage: stage.parse()?,
                    queue_name,
                    event_kind: serde_json::from_value(serde_json::Value::String(event_kind))
                        .map_err(|e| Error::database(format!("Bad event kind: {}", e)))?,
                    recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| Error::database(format!("Bad timestamp: {}", e)))?,
                    item: serde_json::from_str(&item)
                        .map_err(|e| Error::database(format!("Bad item JSON: {}", e)))?,
                })
            },
        )
        .collect()
}

/// Count the rows in a partition.
pub fn count_partition(conn: &Connection, partition_key: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM audit_records WHERE partition_key = ?",
        [partition_key],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}
