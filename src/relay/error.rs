//! Error types for relay operations

use std::path::PathBuf;
use std::string::FromUtf8Error;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use super::command::CommandError;

/// Errors raised while setting up or running the relay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("invalid header {header:?}: {reason}")]
    InvalidHeader { header: String, reason: String },
    #[error("failed to parse origin URL {origin:?}: {reason}")]
    InvalidOrigin { origin: String, reason: String },
    #[error("failed to connect to {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: file is {size} bytes, frame limit is {limit} bytes", .path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: usize },
    #[error("{}: short read, expected {expected} bytes but got {actual}", .path.display())]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
    #[error("transport error: {0}")]
    Transport(#[source] tungstenite::Error),
    #[error("session did not close within {0:?}")]
    CloseTimeout(Duration),
    #[error("console input is not valid UTF-8: {0}")]
    InvalidInput(#[from] FromUtf8Error),
    #[error("use of closed session")]
    SessionClosed,
    #[error("connection closed by peer ({reason})")]
    PeerClosed { reason: String },
    #[error("console error: {0}")]
    Console(#[from] std::io::Error),
    #[error("relay task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl RelayError {
    /// Errors that only affect the current input line; the writer reports
    /// them and keeps reading.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RelayError::Command(_)
                | RelayError::File { .. }
                | RelayError::FileTooLarge { .. }
                | RelayError::ShortRead { .. }
                | RelayError::InvalidInput(_)
        )
    }

    pub(crate) fn from_send(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                RelayError::SessionClosed
            }
            other => RelayError::Transport(other),
        }
    }
}
