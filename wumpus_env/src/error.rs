//! Error types for the Wumpus Arena environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The observer connection behind a sink went away
    #[error("Sink closed: {0}")]
    SinkClosed(String),

    /// Frame or export serialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Filesystem or socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvError {
    /// Creates a sink-closed error.
    pub fn closed(label: impl std::fmt::Display) -> Self {
        Self::SinkClosed(label.to_string())
    }
}

impl From<serde_json::Error> for EnvError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
