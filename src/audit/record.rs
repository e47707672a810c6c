//! The shape of an audit record and its keys.

use batchflow_common::{EventKind, JobId, Stage};
use batchflow_store::models::AuditRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::queue::SubmissionRequest;

/// What happened, with the data observers need to follow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum AuditEvent {
    #[serde(rename_all = "camelCase")]
    SubmittedJob {
        job_id: JobId,
        job_submit_parameters: SubmissionRequest,
    },
    #[serde(rename_all = "camelCase")]
    ProducedOutputs { count: u32, outputs: Vec<String> },
    #[serde(rename_all = "camelCase")]
    CombinedOutputs { artifact: String },
}

impl AuditEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SubmittedJob { .. } => EventKind::SubmittedJob,
            Self::ProducedOutputs { .. } => EventKind::ProducedOutputs,
            Self::CombinedOutputs { .. } => EventKind::CombinedOutputs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub partition_key: String,
    pub sort_key: String,
    pub pipeline_name: String,
    #[serde(rename = "stageName")]
    pub stage: Stage,
    pub queue_name: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl AuditRecord {
    /// Flatten into a table row; the whole record is kept as the row's item.
    pub fn to_row(&self) -> serde_json::Result<AuditRow> {
        Ok(AuditRow {
            partition_key: self.partition_key.clone(),
            sort_key: self.sort_key.clone(),
            pipeline_name: self.pipeline_name.clone(),
            stage: self.stage,
            queue_name: self.queue_name.clone(),
            event_kind: self.event.kind(),
            recorded_at: self.recorded_at,
            item: serde_json::to_value(self)?,
        })
    }
}

/// Build a sort key.
///
/// Stage, array index and attempt separate jobs of the same run; the
/// millisecond timestamp orders records of one job and the sequence number
/// separates records written within the same millisecond.
pub fn sort_key(
    stage: Stage,
    array_index: Option<u32>,
    attempt: u32,
    timestamp_ms: i64,
    sequence: u32,
) -> String {
    let mut key = format!("step-{}", stage);
    if let Some(index) = array_index {
        key.push_str(&format!("_array-{}", index));
    }
    key.push_str(&format!(
        "_attempt-{}_{:013}_{:04}",
        attempt, timestamp_ms, sequence
    ));
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_key_layout() {
        assert_eq!(
            sort_key(Stage::Plan, None, 1, 1_700_000_000_000, 0),
            "step-plan_attempt-1_1700000000000_0000"
        );
        assert_eq!(
            sort_key(Stage::Render, Some(7), 2, 1_700_000_000_000, 3),
            "step-render_array-7_attempt-2_1700000000000_0003"
        );
    }

    #[test]
    fn test_sort_keys_order_by_time_then_sequence() {
        let a = sort_key(Stage::Plan, None, 1, 999, 5);
        let b = sort_key(Stage::Plan, None, 1, 1_000, 0);
        let c = sort_key(Stage::Plan, None, 1, 1_000, 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_record_json_shape() {
        let record = AuditRecord {
            partition_key: "run-r1".into(),
            sort_key: "step-encode_attempt-1_0000000000001_0000".into(),
            pipeline_name: "demo".into(),
            stage: Stage::Encode,
            queue_name: "encode-q".into(),
            recorded_at: DateTime::from_timestamp(1, 0).unwrap(),
            event: AuditEvent::CombinedOutputs {
                artifact: "s3://b/encode/run-r1/video.mp4".into(),
            },
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["partitionKey"], "run-r1");
        assert_eq!(value["stageName"], "encode");
        assert_eq!(value["event"], "combinedOutputs");
        assert_eq!(value["artifact"], json!("s3://b/encode/run-r1/video.mp4"));

        let back: AuditRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_to_row_keeps_item() {
        let record = AuditRecord {
            partition_key: "run-r1".into(),
            sort_key: "k".into(),
            pipeline_name: "demo".into(),
            stage: Stage::Render,
            queue_name: "render-q".into(),
            recorded_at: Utc::now(),
            event: AuditEvent::ProducedOutputs {
                count: 1,
                outputs: vec!["s3://b/render/run-r1/1.jpg".into()],
            },
        };
        let row = record.to_row().unwrap();
        assert_eq!(row.event_kind, EventKind::ProducedOutputs);
        assert_eq!(row.item["count"], 1);
        assert_eq!(row.item["event"], "producedOutputs");
    }
}
