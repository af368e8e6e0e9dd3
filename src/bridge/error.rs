use thiserror::Error;

/// Failures of the correlation broker.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No instrumented application is connected.
    #[error("No peer connected")]
    NoConnection,

    /// The peer did not answer before the deadline.
    #[error("Command '{command}' timed out after {timeout_ms}ms")]
    CommandTimeout { command: String, timeout_ms: u64 },

    /// The peer went away while the command was in flight.
    #[error("Peer disconnected before answering '{command}'")]
    Disconnected { command: String },

    /// The peer executed the command and reported a failure.
    #[error("Command '{command}' failed in the application: {message}")]
    RuntimeCommandFailure { command: String, message: String },

    /// The bridge has been shut down.
    #[error("Bridge closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
