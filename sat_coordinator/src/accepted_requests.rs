//! AcceptedRequests registry (§4.4): tasks this node has promised to execute for
//! peers, with per-entry TTL eviction.

use std::collections::HashMap;
use std::sync::Mutex;

use sat_actor::StopFlag;
use tracing::{debug, info};

use crate::task::TaskId;

#[derive(Debug, Clone, Copy)]
struct Entry {
    frequency: f64,
    expiry: f64,
}

#[derive(Default)]
struct Counters {
    admitted: u64,
    swept: u64,
    submitted: u64,
}

pub struct AcceptedRequests {
    entries: Mutex<HashMap<TaskId, Entry>>,
    counters: Mutex<Counters>,
}

impl AcceptedRequests {
    pub fn new() -> Self {
        AcceptedRequests { entries: Mutex::new(HashMap::new()), counters: Mutex::new(Counters::default()) }
    }

    /// inserts, overwriting any existing entry for the same taskID (§4.4, §7: last
    /// writer wins on a taskID collision).
    pub fn admit(&self, task_id: TaskId, frequency: f64, expiry: f64) {
        let mut entries = self.entries.lock().expect("accepted_requests lock poisoned");
        entries.insert(task_id, Entry { frequency, expiry });
        self.counters.lock().expect("accepted_requests lock poisoned").admitted += 1;
    }

    pub fn has(&self, task_id: TaskId) -> bool {
        self.entries.lock().expect("accepted_requests lock poisoned").contains_key(&task_id)
    }

    pub fn frequency_of(&self, task_id: TaskId) -> Option<f64> {
        self.entries.lock().expect("accepted_requests lock poisoned").get(&task_id).map(|e| e.frequency)
    }

    pub fn remove(&self, task_id: TaskId) -> bool {
        self.entries.lock().expect("accepted_requests lock poisoned").remove(&task_id).is_some()
    }

    /// atomically checks presence and removes in one critical section, returning
    /// the stored frequency - the check-then-remove pair MessageRouter needs for
    /// IMAGE-DATA handling (§5) must never interleave with a concurrent sweep.
    pub fn take(&self, task_id: TaskId) -> Option<f64> {
        let mut entries = self.entries.lock().expect("accepted_requests lock poisoned");
        let removed = entries.remove(&task_id).map(|e| e.frequency);
        if removed.is_some() {
            self.counters.lock().expect("accepted_requests lock poisoned").submitted += 1;
        }
        removed
    }

    pub fn length(&self) -> usize {
        self.entries.lock().expect("accepted_requests lock poisoned").len()
    }

    fn sweep(&self, now: f64) {
        let mut entries = self.entries.lock().expect("accepted_requests lock poisoned");
        let before = entries.len();
        entries.retain(|_, e| e.expiry > now);
        let removed = before - entries.len();
        if removed > 0 {
            self.counters.lock().expect("accepted_requests lock poisoned").swept += removed as u64;
            debug!(removed, remaining = entries.len(), "accepted_requests sweep evicted expired entries");
        }
    }
}

impl Default for AcceptedRequests {
    fn default() -> Self {
        Self::new()
    }
}

/// once-per-second background sweep removing entries whose expiry has passed.
/// A removed entry triggers no further action: the originator's ResponseCollector
/// already handled the timeout from its own side.
pub async fn run_sweep(registry: std::sync::Arc<AcceptedRequests>, stop: StopFlag, period: std::time::Duration) {
    loop {
        tokio::select! {
            _ = stop.wait_for_stop() => {
                info!("accepted_requests sweep stopping");
                return;
            }
            _ = sat_actor::sleep(period) => {
                let now = sat_common::datetime::unix_now();
                registry.sweep(now);
            }
        }
    }
}
