use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::ToolOutput;
use crate::bridge::BridgeError;
use crate::snapshot::EntityId;

/// Failure of a diagnostic tool call. Rendered for the caller by [`ToolError::into_output`].
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// A peer is connected but has not delivered any state yet.
    #[error("No snapshot has been received from the application yet")]
    SnapshotUnavailable,

    #[error("Invalid argument '{field}': {message}")]
    InvalidArgument { field: String, message: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: EntityId },

    #[error("No baseline saved")]
    NoBaseline,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorPayload {
    error: String,
    hint: String,
    next_steps: Vec<String>,
}

impl ToolError {
    pub fn invalid(field: impl Into<String>, message: impl ToString) -> Self {
        ToolError::InvalidArgument {
            field: field.into(),
            message: message.to_string(),
        }
    }

    fn hint(&self) -> (String, Vec<&'static str>) {
        match self {
            ToolError::Bridge(BridgeError::NoConnection) => (
                "The debugging bridge is running, but no application is connected to it."
                    .to_string(),
                vec![
                    "Start the application in development mode with the instrumentation agent enabled",
                    "Refresh the page so the agent reconnects",
                    "Call bridge_status to confirm the connection",
                ],
            ),
            ToolError::Bridge(BridgeError::CommandTimeout { timeout_ms, .. }) => (
                format!(
                    "The application is connected but did not answer within {}ms. It may be busy or paused in a debugger.",
                    timeout_ms
                ),
                vec![
                    "Check whether the application is paused at a breakpoint",
                    "Retry the call",
                    "Refresh the page if the application appears frozen",
                ],
            ),
            ToolError::Bridge(BridgeError::Disconnected { .. }) => (
                "The application disconnected while the command was in flight.".to_string(),
                vec![
                    "Wait for the application to reconnect",
                    "Retry the call",
                ],
            ),
            ToolError::Bridge(BridgeError::RuntimeCommandFailure { command, message }) => {
                runtime_failure_hint(command, message)
            }
            ToolError::Bridge(BridgeError::Closed) => (
                "The debugging bridge is shutting down.".to_string(),
                vec!["Restart devtap"],
            ),
            ToolError::Bridge(BridgeError::Serialization(_)) => (
                "A value could not be encoded for the application.".to_string(),
                vec!["Pass plain JSON values"],
            ),
            ToolError::SnapshotUnavailable => (
                "The application is connected but has not sent its state yet.".to_string(),
                vec![
                    "Wait a moment for the application to finish loading",
                    "Refresh the page",
                ],
            ),
            ToolError::InvalidArgument { field, .. } => (
                format!("The '{}' argument was rejected.", field),
                vec!["Fix the argument and call the tool again"],
            ),
            ToolError::NotFound { kind, .. } => (
                format!("No {} with that id exists in the current state.", kind.to_lowercase()),
                vec![
                    "List the available ids with get_snapshot",
                    "The entity may have been unmounted; take a fresh snapshot",
                ],
            ),
            ToolError::NoBaseline => (
                "A diff needs a baseline to compare against.".to_string(),
                vec!["Call snapshot_diff with action \"save\" first, then reproduce the issue"],
            ),
            ToolError::UnknownTool(_) => (
                "That tool is not provided by devtap.".to_string(),
                vec!["List the available tools with `devtap tools`"],
            ),
        }
    }

    pub fn into_output(self) -> ToolOutput {
        let (hint, next_steps) = self.hint();
        let payload = ErrorPayload {
            error: self.to_string(),
            hint,
            next_steps: next_steps.into_iter().map(str::to_string).collect(),
        };
        ToolOutput {
            content: serde_json::to_value(payload).unwrap_or(Value::Null),
            is_error: true,
        }
    }
}

/// Remediation for a command the application ran and rejected, by command name.
fn runtime_failure_hint(command: &str, message: &str) -> (String, Vec<&'static str>) {
    if message.contains("not supported") {
        return (
            format!("The application's instrumentation does not handle '{}'.", command),
            vec![
                "Enable the matching hook in the application's runtime adapter",
                "Use get_snapshot for the state that is available",
            ],
        );
    }
    match command {
        "set-signal" => (
            "The application rejected the signal write.".to_string(),
            vec![
                "Check that the id exists with get_signals or get_snapshot",
                "Verify the value has the type the signal expects",
            ],
        ),
        "invalidate-query" | "get-query-cache" => (
            "The application's query cache reported a failure.".to_string(),
            vec![
                "List the cached keys with get_query_cache",
                "Check that the key matches exactly",
            ],
        ),
        "eval" => (
            "The expression failed inside the application.".to_string(),
            vec![
                "Check the expression syntax",
                "Check that the runtime exposes eval",
                "Read state with get_signals instead where possible",
            ],
        ),
        "inspect-dom" => (
            "The application could not render the requested component.".to_string(),
            vec![
                "List component ids with get_components",
                "Reduce depth",
                "The component may have unmounted; check get_component_tree",
            ],
        ),
        "get-route" | "navigate" => (
            "The application's router reported a failure.".to_string(),
            vec![
                "Check the path with get_route",
                "Make sure the application uses a router the agent can reach",
            ],
        ),
        _ => (
            "The application received the command and reported a failure.".to_string(),
            vec!["Verify the argument values"],
        ),
    }
}
