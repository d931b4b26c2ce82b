//! minimal tokio runtime/channel shims used across the coordination core, trimmed
//! from the general-purpose, multi-channel actor runtime this project started
//! from: no actor mailboxes or message-set macros, just the named-spawn / sleep /
//! bounded-channel / stop-flag primitives every worker loop (§5) is built on.

pub mod channel;
pub mod errors;
pub mod runtime;

pub use channel::{channel, recv, send, MpscReceiver, MpscSender};
pub use errors::{Result, SatActorError};
pub use runtime::{millis, secs, sleep, spawn, StopFlag};
