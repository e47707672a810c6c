//! Append-only audit trail of what each stage did.
//!
//! Records of one run share a partition key; the sort key carries stage,
//! array index, attempt, a millisecond timestamp and a per-process sequence
//! number. Writes are best-effort: a failure is logged and returned to the
//! caller, which collects it into the stage outcome without undoing work.

pub mod http;
pub mod record;
pub mod store;

pub use http::HttpAuditStore;
pub use record::{sort_key, AuditEvent, AuditRecord};
pub use store::{AuditStore, MemoryAuditStore, SqliteAuditStore};

use std::sync::Arc;

use batchflow_common::{Error, Result, Stage};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::context::RuntimeContext;

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Default)]
struct KeyState {
    last_ms: i64,
    sequence: u32,
}

/// Writes audit records on behalf of one running job.
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    partition_key: String,
    pipeline_name: String,
    stage: Stage,
    queue_name: String,
    array_index: Option<u32>,
    attempt: u32,
    clock: Clock,
    state: Mutex<KeyState>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>, ctx: &RuntimeContext) -> Self {
        Self {
            store,
            partition_key: ctx.run_id.partition_key(),
            pipeline_name: ctx.pipeline_name.clone(),
            stage: ctx.stage,
            queue_name: ctx.queue_name.clone(),
            array_index: ctx.array_index,
            attempt: ctx.attempt,
            clock: Box::new(Utc::now),
            state: Mutex::new(KeyState::default()),
        }
    }

    /// Replace the wall clock, e.g. with a frozen one in tests.
    #[must_use]
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Timestamp and sort key for the next record.
    ///
    /// The timestamp never moves backwards within a process, and the
    /// sequence number keeps keys distinct when it does not move at all.
    fn next_key(&self) -> (DateTime<Utc>, String) {
        let now = (self.clock)();
        let mut state = self.state.lock();
        let ms = now.timestamp_millis().max(state.last_ms);
        state.last_ms = ms;
        let sequence = state.sequence;
        state.sequence = state.sequence.wrapping_add(1) % 10_000;
        drop(state);

        let key = sort_key(self.stage, self.array_index, self.attempt, ms, sequence);
        (now, key)
    }

    /// Append one record. Any failure comes back as `Error::AuditWrite`
    /// after being logged at warn.
    pub async fn record(&self, event: AuditEvent) -> Result<AuditRecord> {
        let (recorded_at, sort_key) = self.next_key();
        let record = AuditRecord {
            partition_key: self.partition_key.clone(),
            sort_key,
            pipeline_name: self.pipeline_name.clone(),
            stage: self.stage,
            queue_name: self.queue_name.clone(),
            recorded_at,
            event,
        };

        match self.store.append(&record).await {
            Ok(()) => {
                debug!(
                    "Audit {} recorded as {}/{}",
                    record.event.kind(),
                    record.partition_key,
                    record.sort_key
                );
                Ok(record)
            }
            Err(e) => {
                let err = match e {
                    Error::AuditWrite(_) => e,
                    other => Error::audit_write(other.to_string()),
                };
                warn!(
                    "Failed to record {} for {}/{}: {}",
                    record.event.kind(),
                    record.partition_key,
                    record.sort_key,
                    err
                );
                Err(err)
            }
        }
    }
}
