use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// one variant per failure kind named in the error-handling design - everything
/// post-startup degrades to a log-and-drop at the call site, nothing here is
/// meant to tear down a worker loop (see §7).
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("malformed frame: {0}")]
    FramingError(String),

    #[error("frame exceeds max size ({0} > {1})")]
    FrameTooLarge(usize, usize),

    #[error("message decode error {0}")]
    DecodeError(#[from] bincode::Error),

    #[error("unknown neighbor {0}")]
    UnknownNeighbor(crate::task::SatId),

    #[error("io error {0}")]
    IoError(#[from] std::io::Error),

    #[error("config parse error {0}")]
    ConfigParseError(String),

    #[error("config validation error {0}")]
    ConfigValidationError(String),

    #[error("actor runtime error {0}")]
    ActorError(#[from] sat_actor::SatActorError),

    #[error("operation failed: {0}")]
    OpFailed(String),
}

pub fn op_failed(msg: impl ToString) -> CoordinatorError {
    CoordinatorError::OpFailed(msg.to_string())
}
