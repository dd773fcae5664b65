use thiserror::Error;

use super::config::AmsNetId;

/// Errors raised by a [`Controller`](super::Controller) connection.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Reading or writing a symbol failed.
    #[error("I/O error on '{symbol}': {reason}")]
    Io { symbol: String, reason: String },

    /// No controller answers at the configured AMS Net ID.
    #[error("controller {net_id} is unreachable")]
    Unreachable { net_id: AmsNetId },

    /// The connection was dropped.
    #[error("controller connection closed")]
    ConnectionClosed,

    /// The transport did not answer in time.
    #[error("timeout waiting for controller")]
    Timeout(#[from] tokio::time::error::Elapsed),
}
