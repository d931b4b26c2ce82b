//! TaskExecutor boundary (§4.7). The real object-detection engine is an external
//! collaborator; this module ships the trait the rest of the core programs
//! against plus one deterministic in-process stand-in so `tryAdmit`/`submit` are
//! exercisable without it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use sat_actor::{MpscSender, StopFlag};

use crate::message::{Message, ProcessedData};
use crate::orbit::{OrbitalOracle, PriorityEntry};
use crate::task::{BoundingBox, SatId, Task};

#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// `(accepted, frequency)`. Rejects outright if `deadline` is already past
    /// `now` (§7: "deadline already past at admit time").
    async fn try_admit(&self, deadline: f64, source_sat: SatId, now: f64) -> (bool, f64);

    /// enqueues `task` for execution at `frequency`; completion emits zero or
    /// more PROCESSED-DATA messages onto the outbound queue.
    async fn submit(&self, task: Task, frequency: f64);
}

/// bounded queue depth and minimum lead time are the admission heuristic; a
/// configurable simulated delay stands in for real inference latency.
pub struct StubDetector {
    self_id: SatId,
    max_queue: usize,
    min_lead_time: f64,
    processing_delay: Duration,
    oracle: Arc<OrbitalOracle>,
    outbound: MpscSender<Message>,
    queue_depth: AtomicUsize,
}

impl StubDetector {
    pub fn new(
        self_id: SatId,
        max_queue: usize,
        min_lead_time: f64,
        processing_delay: Duration,
        oracle: Arc<OrbitalOracle>,
        outbound: MpscSender<Message>,
    ) -> Self {
        StubDetector {
            self_id,
            max_queue,
            min_lead_time,
            processing_delay,
            oracle,
            outbound,
            queue_depth: AtomicUsize::new(0),
        }
    }

    /// the next hop toward ground: the highest-priority ring member that is also
    /// a direct neighbour, or `None` (meaning "ground directly") if self is
    /// already ground-closest.
    fn ground_ward_hop(&self, neighbors: &[SatId; 2]) -> Option<SatId> {
        let priority = self.oracle.priority_list();
        for entry in &priority {
            match entry {
                PriorityEntry::Ground => return None,
                PriorityEntry::Sat(id) if neighbors.contains(id) => return Some(*id),
                PriorityEntry::Sat(_) => continue,
            }
        }
        None
    }

}

#[async_trait]
impl TaskExecutor for StubDetector {
    async fn try_admit(&self, deadline: f64, _source_sat: SatId, now: f64) -> (bool, f64) {
        if deadline - now < self.min_lead_time {
            return (false, 0.0);
        }
        let depth = self.queue_depth.load(Ordering::Acquire);
        if depth >= self.max_queue {
            return (false, 0.0);
        }
        // a fixed frequency stand-in: a real engine would pick this from its power
        // envelope given current thermal/battery state.
        (true, 1_200.0)
    }

    async fn submit(&self, task: Task, _frequency: f64) {
        self.queue_depth.fetch_add(1, Ordering::AcqRel);
        sat_actor::sleep(self.processing_delay).await;
        self.queue_depth.fetch_sub(1, Ordering::AcqRel);

        let bounding_box = BoundingBox { x0: 0, y0: 0, x1: task.image.width, y1: task.image.height };
        let data = ProcessedData {
            cropped_image: task.image.bytes.clone(),
            location: task.location,
            timestamp: sat_common::datetime::unix_now(),
            file_name: task.file_name.clone(),
            bounding_box,
        };

        let first_hop = self.ground_ward_hop(&neighbors_of(&self.oracle, self.self_id));
        let msg = Message::ProcessedData { data, first_hop, last_sender: self.self_id };
        if sat_actor::send(&self.outbound, msg).await.is_err() {
            warn!(task_id = %task.id, "outbound queue closed while emitting processed-data");
        } else {
            info!(task_id = %task.id, "task executed, processed-data enqueued");
        }
    }
}

/// the two ring neighbours of `id`, read off the oracle's own ring (the ring
/// itself never changes after startup, so this is a cheap lookup rather than a
/// stored field).
fn neighbors_of(oracle: &OrbitalOracle, id: SatId) -> [SatId; 2] {
    let ring = oracle.ring();
    let n = ring.len();
    let pos = ring.iter().position(|&x| x == id).expect("self id must be a ring member");
    let left = ring[(pos + n - 1) % n];
    let right = ring[(pos + 1) % n];
    [left, right]
}

/// a queue of committed tasks awaiting execution, drained by [`run_executor`].
/// Keeping submission as a channel (rather than calling `submit` directly from
/// the router) matches the "queue-based" TaskExecutor contract.
pub async fn run_executor(
    executor: Arc<dyn TaskExecutor>,
    mut inbox: sat_actor::MpscReceiver<(Task, f64)>,
    stop: StopFlag,
) {
    loop {
        tokio::select! {
            _ = stop.wait_for_stop() => {
                info!("task_executor stopping");
                return;
            }
            item = sat_actor::recv(&inbox) => {
                match item {
                    Some((task, frequency)) => executor.submit(task, frequency).await,
                    None => return,
                }
            }
        }
    }
}
