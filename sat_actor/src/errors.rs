use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SatActorError>;

#[derive(Error, Debug)]
pub enum SatActorError {
    #[error("receiver closed")]
    ReceiverClosed,

    #[error("senders dropped")]
    SendersDropped,

    #[error("timeout error: {0:?}")]
    Timeout(Duration),

    #[error("join error {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("io error {0}")]
    IoError(#[from] std::io::Error),
}
