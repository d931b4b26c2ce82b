//! the wire message catalog (§6) and the routing fields every variant rewrites
//! on each hop.

use crate::task::{BoundingBox, SatId, Task, TaskId};
use sat_common::Cartesian2;
use serde::{Deserialize, Serialize};

/// cropped detection plus the context the ground pipeline needs to place it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedData {
    pub cropped_image: Vec<u8>,
    pub location: Cartesian2,
    pub timestamp: f64,
    pub file_name: String,
    pub bounding_box: BoundingBox,
}

/// one frame on a neighbour link. Every variant carries `last_sender`, rewritten
/// by the transmitter on every hop (P3); variants that name an intended next hop
/// also carry `first_hop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    Request {
        task_id: TaskId,
        deadline: f64,
        last_sender: SatId,
    },
    Respond {
        task_id: TaskId,
        source_sat: SatId,
        first_hop: SatId,
        last_sender: SatId,
    },
    ResponseNack {
        task_id: TaskId,
        last_sender: SatId,
    },
    ImageData {
        task: Task,
        first_hop: Option<SatId>,
        last_sender: SatId,
    },
    ProcessedData {
        data: ProcessedData,
        first_hop: Option<SatId>,
        last_sender: SatId,
    },
}

impl Message {
    pub fn last_sender(&self) -> SatId {
        match self {
            Message::Request { last_sender, .. }
            | Message::Respond { last_sender, .. }
            | Message::ResponseNack { last_sender, .. }
            | Message::ImageData { last_sender, .. }
            | Message::ProcessedData { last_sender, .. } => *last_sender,
        }
    }

    /// rewrites `last_sender` to `self_id` - called by the transmitter immediately
    /// before a frame goes on the wire (§4.3 step 3), never by the router.
    pub fn set_last_sender(&mut self, self_id: SatId) {
        match self {
            Message::Request { last_sender, .. }
            | Message::Respond { last_sender, .. }
            | Message::ResponseNack { last_sender, .. }
            | Message::ImageData { last_sender, .. }
            | Message::ProcessedData { last_sender, .. } => *last_sender = self_id,
        }
    }

    /// the intended next hop, if the message names one explicitly.
    pub fn first_hop(&self) -> Option<SatId> {
        match self {
            Message::Respond { first_hop, .. } => Some(*first_hop),
            Message::ImageData { first_hop, .. } => *first_hop,
            Message::ProcessedData { first_hop, .. } => *first_hop,
            Message::Request { .. } | Message::ResponseNack { .. } => None,
        }
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Message::Request { task_id, .. }
            | Message::Respond { task_id, .. }
            | Message::ResponseNack { task_id, .. } => Some(*task_id),
            Message::ImageData { task, .. } => Some(task.id),
            Message::ProcessedData { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Request { .. } => "REQUEST",
            Message::Respond { .. } => "RESPOND",
            Message::ResponseNack { .. } => "RESPONSE-NACK",
            Message::ImageData { .. } => "IMAGE-DATA",
            Message::ProcessedData { .. } => "PROCESSED-DATA",
        }
    }
}
