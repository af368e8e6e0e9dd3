//! State snapshot data model shared by the bridge, the agent and the analysis code.
//!
//! A [`Snapshot`] is a point-in-time copy of everything the instrumented runtime knows about:
//! signals (values), effects (derived computations), mounted components and captured errors.
//! Snapshots are replaced wholesale and never edited once captured.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a signal, effect or component within one snapshot.
pub type EntityId = u64;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub signals: Vec<Signal>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
}

impl Snapshot {
    pub fn signal(&self, id: EntityId) -> Option<&Signal> {
        self.signals.iter().find(|s| s.id == id)
    }

    pub fn effect(&self, id: EntityId) -> Option<&Effect> {
        self.effects.iter().find(|e| e.id == id)
    }

    pub fn component(&self, id: EntityId) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Entity counts, used in tool payloads.
    pub fn counts(&self) -> SnapshotCounts {
        SnapshotCounts {
            signals: self.signals.len(),
            effects: self.effects.len(),
            components: self.components.len(),
            errors: self.errors.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotCounts {
    pub signals: usize,
    pub effects: usize,
    pub components: usize,
    pub errors: usize,
}

/// A reactive value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<EntityId>,
}

/// A derived computation that re-runs when one of its dependency signals changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dependency_signal_ids: Vec<EntityId>,
    #[serde(default)]
    pub run_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<TimestampMs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<EntityId>,
}

/// A mounted UI unit. A missing or dangling `parent_id` makes it a root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub message: String,
    #[serde(rename = "type", default = "default_error_kind")]
    pub kind: String,
    #[serde(default)]
    pub timestamp: TimestampMs,
}

fn default_error_kind() -> String {
    "Error".to_string()
}

impl ErrorRecord {
    /// Build an error record from the payload of an `error` event.
    pub fn from_event_data(data: &Value, timestamp: TimestampMs) -> Self {
        let message = data
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| data.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown error".to_string());
        let kind = data
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(default_error_kind);
        Self {
            message,
            kind,
            timestamp,
        }
    }
}

/// A state-change notification as recorded by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    pub timestamp: TimestampMs,
}

/// A saved snapshot used as the comparison point for a later diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub snapshot: Snapshot,
    pub saved_at: TimestampMs,
}

/// Serialize any value for the wire, tolerating values serde_json rejects
/// (non-string map keys, failing `Serialize` impls).
pub fn safe_serialize<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => Value::String(format!("[unserializable: {}]", e)),
    }
}
