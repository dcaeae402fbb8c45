//! Error types for kernel sessions and chunk runs.
//!
//! [`KernelError`] covers everything that can go wrong while talking to one
//! interpreter process. Code that raises an error inside the interpreter is
//! *not* a [`KernelError`]: it comes back as an error output event.
//! [`RunnerError`] is what must-succeed callers see when a report contains
//! such failures.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// The interpreter process could not be started.
    #[error("Failed to start interpreter `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// Writing to or reading from the interpreter failed.
    #[error("Kernel I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// A message could not be encoded.
    #[error("Invalid kernel message: {0}")]
    Json(#[from] serde_json::Error),
    /// No expected message arrived within the allowed time.
    #[error("Timed out after {after:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: &'static str,
        after: Duration,
    },
    /// A reply or event of the wrong kind arrived for the current request.
    #[error("Kernel protocol desynchronised: {0}")]
    ProtocolDesync(String),
    /// The interpreter went away while a message was expected.
    #[error("Kernel channel closed while waiting for {0}")]
    Disconnected(&'static str),
    /// An output payload could not be decoded.
    #[error("Malformed {mime} payload: {reason}")]
    MalformedPayload { mime: String, reason: String },
    /// The session was already closed.
    #[error("Kernel session is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A must-succeed run produced errors; the message lists each failing chunk.
    #[error("Notebook execution failed:\n{0}")]
    ExecutionFailed(String),
    #[error(transparent)]
    Kernel(#[from] KernelError),
}
