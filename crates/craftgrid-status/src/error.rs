//! Status query errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("connect to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("status query timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}
