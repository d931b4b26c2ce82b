//! runtime primitives every long-running worker loop in the core is built from:
//! a named spawn, a sleep that never busy-waits, and a cooperative stop flag that
//! interrupts a blocked wait immediately instead of after it next expires.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tokio::time;

use crate::errors::Result;

#[inline]
pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
#[inline]
pub fn millis(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[inline]
pub async fn sleep(dur: Duration) {
    time::sleep(dur).await;
}

#[inline]
pub fn spawn<F>(name: &str, future: F) -> Result<JoinHandle<F::Output>>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    Ok(task::Builder::new().name(name).spawn(future)?)
}

/// a shared, cheaply-cloned flag each worker checks at its suspension points.
/// Workers race their blocking wait against [`StopFlag::wait_for_stop`] via
/// `tokio::select!` so a shutdown request is observed immediately rather than
/// only after the next timer tick or message arrives.
#[derive(Clone)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        StopFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// resolves once the flag is set - intended to be used as the "other side"
    /// of a `tokio::select!` against a blocking accept/recv/timer future.
    pub async fn wait_for_stop(&self) {
        loop {
            if self.is_stopped() {
                return;
            }
            sleep(millis(50)).await;
        }
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}
