use thiserror::Error;

use crate::snapshot::EntityId;

/// Failure of a command handler inside the instrumented application.
///
/// These never cross the channel as errors: the dispatcher folds them into the response
/// payload as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Signal {0} not found")]
    SignalNotFound(EntityId),

    #[error("{0} is not supported by this runtime")]
    Unsupported(&'static str),

    #[error("Signal {id} rejected the new value: {reason}")]
    Rejected { id: EntityId, reason: String },

    #[error("{0}")]
    Failed(String),
}

/// Connection-level failures of the agent loop.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Failed to connect: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("Socket error: {0}")]
    Socket(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
