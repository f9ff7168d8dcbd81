//! Batch checkpoint types
//!
//! A checkpoint is the resumable position of a batch scan. It is created at
//! the start of an invocation, advanced after each processed record, and
//! either retired (scan complete) or handed back to the caller for the next
//! invocation. Checkpoints are always passed explicitly — there is no
//! process-wide cursor state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ProcessResult;

/// Batch scan mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchMode {
    /// Scan rows whose coordinates are still unset, bounded by a total cap.
    CatchUp,
    /// Scan rows past the cursor id, or updated after the cursor timestamp.
    #[default]
    Incremental,
}

/// Resumable batch position: the last processed record id and its
/// `updated_at`. The nil UUID marks the start of the keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCheckpoint {
    pub last_processed_id: Uuid,
    pub last_processed_timestamp: Option<DateTime<Utc>>,
}

impl BatchCheckpoint {
    pub fn new(last_processed_id: Uuid, last_processed_timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            last_processed_id,
            last_processed_timestamp,
        }
    }

    /// Record that `id` (with `updated_at`) has been processed. Both
    /// cursors are monotonic: an incremental page may contain rows behind
    /// the id cursor (picked up via their `updated_at`), and processing
    /// one must never rewind the scan. The timestamp cursor tracks the
    /// newest `updated_at` seen, so the completion check compares against
    /// the freshest row of the scan regardless of id order.
    pub fn advance(&mut self, id: Uuid, updated_at: Option<DateTime<Utc>>) {
        if id > self.last_processed_id {
            self.last_processed_id = id;
        }
        if let Some(ts) = updated_at {
            if self.last_processed_timestamp.map_or(true, |current| ts > current) {
                self.last_processed_timestamp = Some(ts);
            }
        }
    }
}

impl Default for BatchCheckpoint {
    fn default() -> Self {
        Self::new(Uuid::nil(), None)
    }
}

/// What one batch invocation accomplished.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<ProcessResult>,
    /// Position to resume from if `is_complete` is false.
    pub checkpoint: BatchCheckpoint,
    pub is_complete: bool,
    /// Total rows in the address store at the start of the invocation.
    pub total_count: i64,
}
