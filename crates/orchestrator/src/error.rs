#![forbid(unsafe_code)]

use crate::flight_recorder::ReconcileFailure;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Backend I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode backend payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backend call `{method}` failed: {message}")]
    Rpc { method: String, message: String },

    #[error("Backend connection closed")]
    Disconnected,

    #[error("Failed to halt target: {0}")]
    Halt(#[source] Box<Error>),

    #[error("Stack walk script failed: {message}\nOutput: {output}")]
    Script { message: String, output: String },

    #[error("Malformed stack walk output: {0}")]
    MalformedScriptOutput(String),

    #[error("Invalid frames-of-interest spec: {0}")]
    InvalidFramesSpec(String),

    #[error("Invalid flight recorder event `{name}`: {reason}")]
    InvalidEvent { name: String, reason: String },

    #[error("Found {count} locations for `{frame}`, expected exactly one")]
    AmbiguousFrame { frame: String, count: usize },

    #[error("Flight recorder reconciliation failed for {} event(s): {}", .0.len(), ReconcileFailure::summary(.0))]
    Reconcile(Vec<ReconcileFailure>),
}

impl Error {
    /// Wrap a backend error raised while halting the target.
    pub fn halt(err: Error) -> Self {
        Self::Halt(Box::new(err))
    }
}
