//! thin wrapper around the flume async mpsc channel, kept as a separate module
//! (rather than using `flume` directly everywhere) so the rest of the core can be
//! ported to a different channel crate without touching call sites - the same
//! reasoning the upstream actor runtime applies to its own channel abstraction.

use flume::{bounded, Receiver, Sender};

pub type MpscSender<T> = Sender<T>;
pub type MpscReceiver<T> = Receiver<T>;

pub fn channel<T>(bound: usize) -> (MpscSender<T>, MpscReceiver<T>) {
    bounded::<T>(bound)
}

pub async fn send<T>(tx: &MpscSender<T>, msg: T) -> crate::errors::Result<()> {
    tx.send_async(msg)
        .await
        .map_err(|_| crate::errors::SatActorError::SendersDropped)
}

/// `None` means the channel was closed (all senders dropped) - distinct from a
/// successful receive, mirroring the upstream `recv()`/closed-channel distinction.
pub async fn recv<T>(rx: &MpscReceiver<T>) -> Option<T> {
    rx.recv_async().await.ok()
}
