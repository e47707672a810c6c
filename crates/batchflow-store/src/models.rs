//! Rust models matching the database schema.

use batchflow_common::{EventKind, Stage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the `audit_records` table.
///
/// `item` holds the complete record as JSON, so observers reading the table
/// see exactly what the job wrote; the other columns duplicate the fields
/// needed for filtering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRow {
    pub partition_key: String,
    pub sort_key: String,
    pub pipeline_name: String,
    pub stage: Stage,
    pub queue_name: String,
    pub event_kind: EventKind,
    pub recorded_at: DateTime<Utc>,
    pub item: serde_json::Value,
}
