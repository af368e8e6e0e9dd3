//! Deserializable argument types for the diagnostic tools.

use serde::Deserialize;
use serde_json::Value;

use crate::analysis::{DiagnoseFocus, Direction};
use crate::snapshot::{EntityId, TimestampMs};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSignalsInput {
    #[serde(default)]
    pub id: Option<EntityId>,
    /// Regular expression matched against signal names.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEffectsInput {
    #[serde(default)]
    pub min_run_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinceInput {
    #[serde(default)]
    pub since: Option<TimestampMs>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEventsInput {
    #[serde(default)]
    pub since: Option<TimestampMs>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSignalInput {
    pub id: EntityId,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateQueryInput {
    pub key: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchInput {
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentTreeInput {
    #[serde(default)]
    pub root_id: Option<EntityId>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraphInput {
    #[serde(default)]
    pub signal_id: Option<EntityId>,
    #[serde(default)]
    pub effect_id: Option<EntityId>,
    #[serde(default)]
    pub direction: Option<Direction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnoseInput {
    #[serde(default)]
    pub focus: Option<DiagnoseFocus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffAction {
    Save,
    Diff,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDiffInput {
    pub action: DiffAction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalInput {
    pub expression: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectDomInput {
    pub component_id: EntityId,
    #[serde(default)]
    pub depth: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateInput {
    pub path: String,
    #[serde(default)]
    pub replace: bool,
}
