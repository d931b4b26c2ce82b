//! the unit of work (§3) and its 56-bit identifier.

use sat_common::Cartesian2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// a satellite's hardware identifier; also used unqualified as "satellite id"
/// throughout the routing layer.
pub type SatId = u64;

const ORIGIN_MASK: u64 = 0x0000_FFFF_FFFF_FFFF; // low 48 bits
const COUNTER_SHIFT: u32 = 48; // high 8 bits

/// 56-bit task identifier: low 48 bits are the originating satellite's hardware
/// id, high 8 bits are an originator-local monotonic counter. Stored in a `u64`
/// with the top 8 bits always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(origin: SatId, counter: u8) -> Self {
        let packed = (origin & ORIGIN_MASK) | ((counter as u64) << COUNTER_SHIFT);
        TaskId(packed)
    }

    /// low 48 bits: the id of the satellite that originated this task.
    pub fn origin(&self) -> SatId {
        self.0 & ORIGIN_MASK
    }

    pub fn counter(&self) -> u8 {
        (self.0 >> COUNTER_SHIFT) as u8
    }

    /// the raw 56-bit value, big-endian interpretation - used for the
    /// `taskID_int` field of the task-request-timeout telemetry event (§8, scenario 4).
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#016x}", self.0)
    }
}

/// an opaque raw image payload with known dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageBuf {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// a bounding box in image pixel coordinates, as returned by the (external)
/// detector and carried unchanged through PROCESSED-DATA.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

/// a unit of work. Once constructed the image payload is never mutated - callers
/// that need to hand a task to multiple components (a ResponseCollector entry and,
/// later, an AcceptedRequests entry) share it via `Arc` rather than cloning the
/// image bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub created: f64,
    pub deadline: f64,
    pub location: Cartesian2,
    pub file_name: String,
    pub image: Arc<ImageBuf>,
}

impl Task {
    /// fails (returns `None`) if the deadline invariant (`deadline >= created`) is violated.
    pub fn new(
        id: TaskId,
        created: f64,
        deadline: f64,
        location: Cartesian2,
        file_name: impl Into<String>,
        image: ImageBuf,
    ) -> Option<Self> {
        if deadline < created {
            return None;
        }
        Some(Task {
            id,
            created,
            deadline,
            location,
            file_name: file_name.into(),
            image: Arc::new(image),
        })
    }

    pub fn remaining(&self, now: f64) -> f64 {
        self.deadline - now
    }
}
