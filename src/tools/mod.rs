//! Diagnostic tool layer: named operations an external agent calls to inspect and steer the
//! connected application.
//!
//! - `catalog`: tool names, descriptions and argument schemas
//! - `inputs`: argument structs
//! - `handlers`: [`DiagnosticTools`], which runs a tool against the bridge
//! - `error`: [`ToolError`] and its rendering into hint-bearing payloads

pub mod catalog;
pub mod error;
pub mod handlers;
pub mod inputs;

use serde::Serialize;
use serde_json::Value;

pub use catalog::{definitions, ToolDefinition};
pub use error::ToolError;
pub use handlers::DiagnosticTools;

/// Result of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub content: Value,
    pub is_error: bool,
}
