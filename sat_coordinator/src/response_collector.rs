//! ResponseCollector (§4.5): deadline-driven delegation for tasks this node
//! originated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sat_actor::{MpscSender, StopFlag};
use tracing::{info, warn};

use crate::message::Message;
use crate::orbit::{OrbitalOracle, PriorityEntry};
use crate::task::{SatId, Task, TaskId};

#[derive(Debug, Clone, Copy)]
struct ResponseEntry {
    source_sat: SatId,
    last_sender: SatId,
}

struct Entry {
    task: Task,
    remaining: f64,
    responses: Vec<ResponseEntry>,
}

#[derive(Default)]
struct Counters {
    delegated_one_response: u64,
    delegated_two_response: u64,
    delegated_timeout_dual_send: u64,
}

pub struct ResponseCollector {
    self_id: SatId,
    neighbors: [SatId; 2],
    oracle: Arc<OrbitalOracle>,
    outbound: MpscSender<Message>,
    table: Mutex<HashMap<TaskId, Entry>>,
    counters: Mutex<Counters>,
}

impl ResponseCollector {
    pub fn new(self_id: SatId, neighbors: [SatId; 2], oracle: Arc<OrbitalOracle>, outbound: MpscSender<Message>) -> Self {
        ResponseCollector {
            self_id,
            neighbors,
            oracle,
            outbound,
            table: Mutex::new(HashMap::new()),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// registers a task this node originated; `remainingTime` starts at the
    /// task's deadline minus the current time.
    pub fn add_task(&self, task: Task, now: f64) {
        let remaining = task.deadline - now;
        let task_id = task.id;
        let mut table = self.table.lock().expect("response_collector lock poisoned");
        table.insert(task_id, Entry { task, remaining, responses: Vec::new() });
    }

    pub fn has(&self, task_id: TaskId) -> bool {
        self.table.lock().expect("response_collector lock poisoned").contains_key(&task_id)
    }

    /// a RESPOND arrived. On the second distinct response, resolves delegation
    /// immediately rather than waiting for the next tick. Returns whether this
    /// node is tracking `task_id` as originator at all - a relay (no matching
    /// entry) reports `false` so the caller can forward the RESPOND on toward
    /// the originator instead of swallowing it (§7).
    pub async fn add_response(&self, task_id: TaskId, source_sat: SatId, last_sender: SatId) -> bool {
        let resolved = {
            let mut table = self.table.lock().expect("response_collector lock poisoned");
            let Some(entry) = table.get_mut(&task_id) else {
                return false;
            };
            entry.responses.push(ResponseEntry { source_sat, last_sender });
            if entry.responses.len() >= 2 {
                table.remove(&task_id)
            } else {
                None
            }
        };
        if let Some(entry) = resolved {
            self.counters.lock().expect("response_collector lock poisoned").delegated_two_response += 1;
            let delegate = self.pick_delegate(&entry.responses);
            self.emit_image_data(&entry.task, Some(delegate.last_sender)).await;
        }
        true
    }

    /// a RESPONSE-NACK arrived: removes the matching RESPOND (identified by the
    /// peer that sent it), if any; the entry otherwise keeps waiting.
    pub fn cancel_response(&self, task_id: TaskId, last_sender: SatId) {
        let mut table = self.table.lock().expect("response_collector lock poisoned");
        if let Some(entry) = table.get_mut(&task_id) {
            entry.responses.retain(|r| r.last_sender != last_sender);
        }
    }

    /// picks the delegate when two RESPONDs are in hand: walk the priority list
    /// from its lowest-priority (tail) end; the first of the two responders
    /// encountered wins, since the tail is farthest from ground and has the most
    /// spare downlink capacity.
    fn pick_delegate<'a>(&self, responses: &'a [ResponseEntry]) -> &'a ResponseEntry {
        let priority = self.oracle.priority_list();
        for entry in priority.iter().rev() {
            if let PriorityEntry::Sat(id) = entry {
                if let Some(r) = responses.iter().find(|r| r.source_sat == *id) {
                    return r;
                }
            }
        }
        &responses[0]
    }

    async fn emit_image_data(&self, task: &Task, first_hop: Option<SatId>) {
        let msg = Message::ImageData { task: task.clone(), first_hop, last_sender: self.self_id };
        if sat_actor::send(&self.outbound, msg).await.is_err() {
            warn!(task_id = %task.id, "outbound queue closed while emitting delegated image-data");
        }
    }

    /// advances every tracked entry's remaining time by `-dt` and resolves any
    /// that have crossed their deadline.
    pub async fn tick(&self, dt: f64) {
        let expired: Vec<Entry> = {
            let mut table = self.table.lock().expect("response_collector lock poisoned");
            let mut expired_ids = Vec::new();
            for (id, entry) in table.iter_mut() {
                entry.remaining -= dt;
                if entry.remaining <= 0.0 {
                    expired_ids.push(*id);
                }
            }
            expired_ids.into_iter().filter_map(|id| table.remove(&id)).collect()
        };

        for entry in expired {
            match entry.responses.len() {
                1 => {
                    self.counters.lock().expect("response_collector lock poisoned").delegated_one_response += 1;
                    let r = entry.responses[0];
                    self.emit_image_data(&entry.task, Some(r.last_sender)).await;
                }
                2.. => {
                    // a tick observed a fully-answered entry the arrival path should
                    // already have resolved; treat it the same way defensively.
                    self.counters.lock().expect("response_collector lock poisoned").delegated_two_response += 1;
                    let delegate = self.pick_delegate(&entry.responses);
                    let first_hop = delegate.last_sender;
                    self.emit_image_data(&entry.task, Some(first_hop)).await;
                }
                _ => {
                    self.counters.lock().expect("response_collector lock poisoned").delegated_timeout_dual_send += 1;
                    info!(task_id = %entry.task.id, task_id_int = entry.task.id.as_u64(), "task request timed out with no responses, dual-sending");
                    self.emit_image_data(&entry.task, Some(self.neighbors[0])).await;
                    self.emit_image_data(&entry.task, Some(self.neighbors[1])).await;
                }
            }
        }
    }
}

/// the periodic tick worker (§5): sleeps `period` between ticks, racing a
/// blocked sleep against the shared stop flag so shutdown is observed promptly.
pub async fn run_tick(collector: Arc<ResponseCollector>, stop: StopFlag, period: std::time::Duration) {
    loop {
        tokio::select! {
            _ = stop.wait_for_stop() => {
                info!("response_collector tick stopping");
                return;
            }
            _ = sat_actor::sleep(period) => {
                collector.tick(period.as_secs_f64()).await;
            }
        }
    }
}
