//! Best-effort quest/telemetry recording.
//!
//! `record` never fails and never blocks the duel flow: entries are pushed
//! into an in-memory list and forwarded over an mpsc channel to a background
//! worker for offloaded processing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use rocket::serde::json::Json;
use rocket::serde::{Deserialize, Serialize};
use rocket_okapi::{openapi, JsonSchema};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ActionRecord {
    pub seq: u64,
    pub user_id: String,
    pub action: String,
    pub amount: i64,
    pub timestamp_ms: u64,
}

#[derive(Debug)]
pub struct ActionRecorder {
    entries: Arc<Mutex<Vec<ActionRecord>>>,
    seq: AtomicU64,
    sender: mpsc::Sender<ActionRecord>,
}

impl ActionRecorder {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<ActionRecord>();
        thread::spawn(move || {
            // Worker consumes the channel for offloaded processing
            // (quest tracking, analytics). Entries are already stored
            // in memory by record(), so the worker just drains.
            for _entry in rx {}
        });
        ActionRecorder {
            entries: Arc::new(Mutex::new(Vec::new())),
            seq: AtomicU64::new(0),
            sender: tx,
        }
    }

    /// Fire-and-forget. A poisoned lock or closed channel is swallowed;
    /// telemetry must never abort the caller.
    pub fn record(&self, user_id: &str, action: &str, amount: i64) {
        let entry = ActionRecord {
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            user_id: user_id.to_string(),
            action: action.to_string(),
            amount,
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        };
        match self.entries.lock() {
            Ok(mut guard) => guard.push(entry.clone()),
            Err(poisoned) => poisoned.into_inner().push(entry.clone()),
        }
        let _ = self.sender.send(entry);
    }

    pub fn entries(&self) -> Vec<ActionRecord> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for ActionRecorder {
    fn default() -> Self {
        ActionRecorder::new()
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(crate = "rocket::serde")]
pub struct ActionLogResponse {
    pub entries: Vec<ActionRecord>,
    pub next_seq: Option<u64>,
    pub limit: usize,
}

/// Recorded actions, filterable by sequence and action name.
#[openapi]
#[get("/actions/log?<from_seq>&<limit>&<action>")]
pub async fn list_actions_log(
    from_seq: Option<u64>,
    limit: Option<usize>,
    action: Option<String>,
    recorder: &rocket::State<Arc<ActionRecorder>>,
) -> Json<ActionLogResponse> {
    let mut filtered: Vec<ActionRecord> = recorder
        .entries()
        .into_iter()
        .filter(|e| {
            if let Some(f) = from_seq {
                if e.seq < f {
                    return false;
                }
            }
            if let Some(ref a) = action {
                if e.action != *a {
                    return false;
                }
            }
            true
        })
        .collect();
    let max = limit.unwrap_or(1000);
    let has_more = filtered.len() > max;
    filtered.truncate(max);
    let next_seq = if has_more {
        filtered.last().map(|e| e.seq + 1)
    } else {
        None
    };
    Json(ActionLogResponse {
        entries: filtered,
        next_seq,
        limit: max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_assigns_monotonic_sequences() {
        let recorder = ActionRecorder::new();
        recorder.record("alice", "duel", 1);
        recorder.record("bob", "duel", 1);
        let entries = recorder.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].seq, 0);
        assert_eq!(entries[1].seq, 1);
        assert_eq!(entries[0].user_id, "alice");
    }
}
