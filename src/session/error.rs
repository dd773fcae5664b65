//! Error types for simulator sessions.

use crate::controller::ControllerState;
use crate::controller::error::ControllerError;

use super::SessionId;

/// A session could not be established.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("controller connection failed: {0}")]
    Controller(#[from] ControllerError),

    /// The controller answered but its runtime on `port` is not in RUN.
    #[error("wrong port number {port}: controller runtime is in state {state:?}")]
    WrongPort { port: u16, state: ControllerState },

    #[error("timed out waiting for the controller")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error(transparent)]
    SessionAlreadyActive(#[from] SessionAlreadyActive),
}

/// Indicates that a session could not be established because one is already running.
#[derive(Debug, thiserror::Error)]
#[error("session {session_id} is already active")]
pub struct SessionAlreadyActive {
    pub session_id: SessionId,
}
