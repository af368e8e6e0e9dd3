//! Wire messages exchanged between the bridge and the instrumented application.
//!
//! Peer to bridge frames are `type`-tagged ([`PeerMessage`]). Bridge to peer frames carry a
//! command name, a correlation id and an argument object ([`Command`] + [`CorrelationId`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::snapshot::{EntityId, Snapshot};

/// Opaque token pairing one outbound command with its single response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Frames sent by the instrumented application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PeerMessage {
    /// Full state push
    Snapshot { data: Snapshot },

    /// Single state-change notification
    Event {
        event: String,
        #[serde(default)]
        data: Value,
    },

    /// Several notifications coalesced into one frame
    Events { batch: Vec<EventPayload> },

    /// Answer to a command
    Response {
        #[serde(rename = "correlationId")]
        correlation_id: CorrelationId,
        #[serde(default)]
        data: Value,
    },
}

impl PeerMessage {
    /// Parse a text frame. Malformed frames yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping malformed peer frame");
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// The closed set of commands the bridge can ask the application to execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "kebab-case")]
pub enum Command {
    GetSnapshot {},
    GetQueryCache {},
    SetSignal {
        id: EntityId,
        value: Value,
    },
    InvalidateQuery {
        key: String,
    },
    Eval {
        expression: String,
    },
    InspectDom {
        #[serde(rename = "componentId")]
        component_id: EntityId,
        depth: u32,
    },
    GetRoute {},
    Navigate {
        path: String,
        #[serde(default)]
        replace: bool,
    },
}

impl Command {
    pub const NAMES: &'static [&'static str] = &[
        "get-snapshot",
        "get-query-cache",
        "set-signal",
        "invalidate-query",
        "eval",
        "inspect-dom",
        "get-route",
        "navigate",
    ];

    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetSnapshot {} => "get-snapshot",
            Command::GetQueryCache {} => "get-query-cache",
            Command::SetSignal { .. } => "set-signal",
            Command::InvalidateQuery { .. } => "invalidate-query",
            Command::Eval { .. } => "eval",
            Command::InspectDom { .. } => "inspect-dom",
            Command::GetRoute {} => "get-route",
            Command::Navigate { .. } => "navigate",
        }
    }

    /// Encode as `{command, correlationId, args}`.
    pub fn encode(&self, correlation_id: &CorrelationId) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "correlationId".to_string(),
                Value::String(correlation_id.to_string()),
            );
        }
        serde_json::to_string(&value)
    }
}

/// A command frame as received by the application, before the command is decoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundCommand {
    pub command: String,
    pub correlation_id: CorrelationId,
    #[serde(default)]
    pub args: Value,
}

impl InboundCommand {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Decode the typed command. Missing `args` is treated as `{}`.
    pub fn decode(&self) -> Result<Command, serde_json::Error> {
        let args = if self.args.is_null() {
            json!({})
        } else {
            self.args.clone()
        };
        serde_json::from_value(json!({ "command": self.command, "args": args }))
    }
}
