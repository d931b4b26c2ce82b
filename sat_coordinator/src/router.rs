//! MessageRouter (§4.6): the single dispatcher that classifies each inbox
//! message and drives the state machines owned by the other components.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sat_actor::{MpscReceiver, MpscSender, StopFlag};
use tracing::info;

use crate::accepted_requests::AcceptedRequests;
use crate::executor::TaskExecutor;
use crate::message::Message;
use crate::response_collector::ResponseCollector;
use crate::task::{SatId, Task};

/// how often (in dispatched messages) the router logs a liveness summary.
const DEFAULT_SUMMARY_INTERVAL: u64 = 100;

pub struct MessageRouter {
    self_id: SatId,
    accepted: Arc<AcceptedRequests>,
    collector: Arc<ResponseCollector>,
    executor: Arc<dyn TaskExecutor>,
    execution_queue: MpscSender<(Task, f64)>,
    outbound: MpscSender<Message>,
    dispatched: AtomicU64,
    summary_interval: u64,
}

impl MessageRouter {
    pub fn new(
        self_id: SatId,
        accepted: Arc<AcceptedRequests>,
        collector: Arc<ResponseCollector>,
        executor: Arc<dyn TaskExecutor>,
        execution_queue: MpscSender<(Task, f64)>,
        outbound: MpscSender<Message>,
    ) -> Self {
        MessageRouter {
            self_id,
            accepted,
            collector,
            executor,
            execution_queue,
            outbound,
            dispatched: AtomicU64::new(0),
            summary_interval: DEFAULT_SUMMARY_INTERVAL,
        }
    }

    async fn forward(&self, msg: Message) {
        if sat_actor::send(&self.outbound, msg).await.is_err() {
            tracing::warn!("outbound queue closed while forwarding message");
        }
    }

    /// entry point for a task freshly emitted by the (out-of-scope) mission
    /// scheduler, per §2's data flow: tries local admission first; a self-admit
    /// goes straight to the execution queue and never touches the
    /// ResponseCollector, while a decline broadcasts REQUEST to both neighbours
    /// and registers the task with the ResponseCollector as originator (§8
    /// scenarios 1-2).
    pub async fn originate_task(&self, task: Task, now: f64) {
        let (accepted, frequency) = self.executor.try_admit(task.deadline, self.self_id, now).await;
        if accepted {
            if sat_actor::send(&self.execution_queue, (task, frequency)).await.is_err() {
                tracing::warn!("execution queue closed while submitting self-admitted task");
            }
            return;
        }

        let task_id = task.id;
        let deadline = task.deadline;
        self.collector.add_task(task, now);
        self.forward(Message::Request { task_id, deadline, last_sender: self.self_id }).await;
    }

    pub async fn dispatch(&self, msg: Message, now: f64) {
        match msg {
            Message::Request { task_id, deadline, last_sender } => {
                let source = task_id.origin();
                let (accepted, frequency) = self.executor.try_admit(deadline, source, now).await;
                if accepted {
                    let expiry = deadline;
                    self.accepted.admit(task_id, frequency, expiry);
                    let respond = Message::Respond {
                        task_id,
                        source_sat: self.self_id,
                        first_hop: last_sender,
                        last_sender: self.self_id,
                    };
                    self.forward(respond).await;
                } else {
                    self.forward(Message::Request { task_id, deadline, last_sender }).await;
                }
            }
            Message::Respond { task_id, source_sat, first_hop, last_sender } => {
                // this node may be an intermediate relay between a delegate and
                // the originator (declined REQUESTs are forwarded around the
                // ring, so the two can be more than one hop apart); when no
                // ResponseCollector entry matches, forward rather than drop
                // (§7: "no matching entry - forward").
                if !self.collector.add_response(task_id, source_sat, last_sender).await {
                    self.forward(Message::Respond { task_id, source_sat, first_hop, last_sender }).await;
                }
            }
            Message::ImageData { task, first_hop, last_sender } => {
                if let Some(frequency) = self.accepted.take(task.id) {
                    if sat_actor::send(&self.execution_queue, (task, frequency)).await.is_err() {
                        tracing::warn!("execution queue closed while committing accepted task");
                    }
                } else {
                    self.forward(Message::ImageData { task, first_hop, last_sender }).await;
                }
            }
            Message::ResponseNack { task_id, last_sender } => {
                if self.accepted.has(task_id) {
                    // peer-side: this node had admitted the task and promised a
                    // RESPOND; the originator superseded it (§4.4 invariant, §8
                    // scenario 5).
                    self.accepted.remove(task_id);
                } else if self.collector.has(task_id) {
                    // originator-side: a responder is retracting its earlier
                    // RESPOND before we committed to it (§4.5 cancellation).
                    self.collector.cancel_response(task_id, last_sender);
                } else {
                    self.forward(Message::ResponseNack { task_id, last_sender }).await;
                }
            }
            Message::ProcessedData { data, first_hop, last_sender } => {
                self.forward(Message::ProcessedData { data, first_hop, last_sender }).await;
            }
        }

        let count = self.dispatched.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.summary_interval == 0 {
            info!(dispatched = count, "message_router liveness summary");
        }
    }
}

/// the router worker loop: drains the shared inbox and dispatches one message
/// at a time, so per-taskID decisions stay serialised (§4.6).
pub async fn run_router(
    router: Arc<MessageRouter>,
    mut inbox: MpscReceiver<Message>,
    stop: StopFlag,
    now: impl Fn() -> f64 + Send + Sync + 'static,
) {
    loop {
        tokio::select! {
            _ = stop.wait_for_stop() => {
                info!("message_router stopping");
                return;
            }
            msg = sat_actor::recv(&inbox) => {
                match msg {
                    Some(msg) => router.dispatch(msg, now()).await,
                    None => return,
                }
            }
        }
    }
}
