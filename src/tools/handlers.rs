//! Tool handlers over the bridge.

use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::error::ToolError;
use super::inputs::*;
use super::ToolOutput;
use crate::analysis::tree::DEFAULT_TREE_DEPTH;
use crate::analysis::{
    build_component_tree, build_dependency_graph, diagnose, diff_snapshots, Focus, GraphError,
    TreeOptions,
};
use crate::bridge::{Bridge, BridgeError, Command};
use crate::snapshot::{safe_serialize, ErrorRecord, Snapshot, TimestampMs};
use crate::util::time::now_ms;

pub const WATCH_DEFAULT_MS: u64 = 5000;
pub const WATCH_MIN_MS: u64 = 500;
pub const WATCH_MAX_MS: u64 = 30_000;
/// Events returned by one `watch` call.
pub const WATCH_EVENT_LIMIT: usize = 200;

pub const EVAL_DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const EVAL_MIN_TIMEOUT_MS: u64 = 100;
pub const EVAL_MAX_TIMEOUT_MS: u64 = 30_000;

pub const INSPECT_DEFAULT_DEPTH: u32 = 3;
pub const INSPECT_MAX_DEPTH: u32 = 10;

const EVENTS_DEFAULT_LIMIT: usize = 100;

type ToolResult = Result<Value, ToolError>;

/// The diagnostic tool set, bound to one bridge.
#[derive(Clone)]
pub struct DiagnosticTools {
    bridge: Bridge,
}

impl DiagnosticTools {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Run tool `name`. Failures come back as an error payload, never as a panic or `Err`.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolOutput {
        let start = Instant::now();
        let result = self.dispatch_inner(name, args).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(content) => {
                tracing::debug!(tool = name, duration_ms, "Tool call succeeded");
                ToolOutput {
                    content,
                    is_error: false,
                }
            }
            Err(e) => {
                tracing::info!(tool = name, duration_ms, error = %e, "Tool call failed");
                e.into_output()
            }
        }
    }

    async fn dispatch_inner(&self, name: &str, args: Value) -> ToolResult {
        match name {
            "get_signals" => self.get_signals(parse(args)?).await,
            "get_effects" => self.get_effects(parse(args)?).await,
            "get_components" => self.get_components().await,
            "get_snapshot" => self.get_snapshot().await,
            "get_errors" => self.get_errors(parse(args)?),
            "get_events" => self.get_events(parse(args)?),
            "get_query_cache" => self.passthrough(Command::GetQueryCache {}).await,
            "set_signal" => self.set_signal(parse(args)?).await,
            "invalidate_query" => {
                let input: InvalidateQueryInput = parse(args)?;
                self.passthrough(Command::InvalidateQuery { key: input.key })
                    .await
            }
            "watch" => self.watch(parse(args)?).await,
            "get_component_tree" => self.component_tree(parse(args)?).await,
            "get_dependency_graph" => self.dependency_graph(parse(args)?).await,
            "diagnose" => self.diagnose(parse(args)?).await,
            "snapshot_diff" => self.snapshot_diff(parse(args)?).await,
            "eval" => self.eval(parse(args)?).await,
            "inspect_dom" => self.inspect_dom(parse(args)?).await,
            "get_route" => self.get_route().await,
            "navigate" => self.navigate(parse(args)?).await,
            "bridge_status" => Ok(safe_serialize(&self.bridge.status())),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// Cached or refreshed snapshot; distinguishes "nobody connected" from "nothing sent yet".
    async fn snapshot(&self) -> Result<Arc<Snapshot>, ToolError> {
        match self.bridge.get_or_refresh_snapshot().await {
            Some(snapshot) => Ok(snapshot),
            None if !self.bridge.is_connected() => Err(BridgeError::NoConnection.into()),
            None => Err(ToolError::SnapshotUnavailable),
        }
    }

    async fn passthrough(&self, command: Command) -> ToolResult {
        Ok(self.bridge.request(command).await?)
    }

    // ========================================================================
    // Read
    // ========================================================================

    async fn get_signals(&self, input: GetSignalsInput) -> ToolResult {
        let pattern = input
            .name
            .as_deref()
            .map(|p| compile_filter("name", p))
            .transpose()?;
        let snapshot = self.snapshot().await?;
        let signals: Vec<_> = snapshot
            .signals
            .iter()
            .filter(|s| input.id.map_or(true, |id| s.id == id))
            .filter(|s| pattern.as_ref().map_or(true, |re| re.is_match(&s.name)))
            .collect();
        Ok(json!({ "count": signals.len(), "signals": signals }))
    }

    async fn get_effects(&self, input: GetEffectsInput) -> ToolResult {
        let snapshot = self.snapshot().await?;
        let min = input.min_run_count.unwrap_or(0);
        let effects: Vec<_> = snapshot
            .effects
            .iter()
            .filter(|e| e.run_count >= min)
            .collect();
        Ok(json!({ "count": effects.len(), "effects": effects }))
    }

    async fn get_components(&self) -> ToolResult {
        let snapshot = self.snapshot().await?;
        Ok(json!({
            "count": snapshot.components.len(),
            "components": snapshot.components,
        }))
    }

    async fn get_snapshot(&self) -> ToolResult {
        let snapshot = self.snapshot().await?;
        Ok(safe_serialize(snapshot.as_ref()))
    }

    fn get_errors(&self, input: SinceInput) -> ToolResult {
        let snapshot = self.bridge.snapshot();
        let errors = self.recorded_errors(input.since, snapshot.as_deref());
        Ok(json!({ "count": errors.len(), "errors": errors }))
    }

    /// The bridge error log, or the errors `snapshot` carried while nothing has been streamed.
    fn recorded_errors(
        &self,
        since: Option<TimestampMs>,
        snapshot: Option<&Snapshot>,
    ) -> Vec<ErrorRecord> {
        if self.bridge.status().errors > 0 {
            return self.bridge.errors(since);
        }
        snapshot
            .map(|snapshot| {
                snapshot
                    .errors
                    .iter()
                    .filter(|e| since.map_or(true, |since| e.timestamp > since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_events(&self, input: GetEventsInput) -> ToolResult {
        let pattern = input
            .name
            .as_deref()
            .map(|p| compile_filter("name", p))
            .transpose()?;
        let mut events: Vec<_> = self
            .bridge
            .events(input.since)
            .into_iter()
            .filter(|e| pattern.as_ref().map_or(true, |re| re.is_match(&e.event)))
            .collect();
        let limit = input.limit.unwrap_or(EVENTS_DEFAULT_LIMIT);
        let total = events.len();
        if total > limit {
            events.drain(..total - limit);
        }
        Ok(json!({ "count": events.len(), "total": total, "events": events }))
    }

    // ========================================================================
    // Write
    // ========================================================================

    async fn set_signal(&self, input: SetSignalInput) -> ToolResult {
        let id = input.id;
        let data = self
            .bridge
            .request(Command::SetSignal {
                id,
                value: input.value,
            })
            .await?;
        Ok(json!({
            "id": id,
            "previous": data.get("previous").cloned().unwrap_or(Value::Null),
            "current": data.get("current").cloned().unwrap_or(Value::Null),
        }))
    }

    // ========================================================================
    // Observe
    // ========================================================================

    /// Sleeps for the whole clamped window, then reports what arrived meanwhile.
    async fn watch(&self, input: WatchInput) -> ToolResult {
        let pattern = input
            .filter
            .as_deref()
            .map(|p| compile_filter("filter", p))
            .transpose()?;
        let duration_ms = input
            .duration_ms
            .unwrap_or(WATCH_DEFAULT_MS)
            .clamp(WATCH_MIN_MS, WATCH_MAX_MS);

        let started = now_ms();
        tokio::time::sleep(Duration::from_millis(duration_ms)).await;

        let matching: Vec<_> = self
            .bridge
            .events(Some(started - 1))
            .into_iter()
            .filter(|e| pattern.as_ref().map_or(true, |re| re.is_match(&e.event)))
            .collect();
        let total = matching.len();
        let events: Vec<_> = matching.into_iter().take(WATCH_EVENT_LIMIT).collect();

        Ok(json!({
            "durationMs": duration_ms,
            "total": total,
            "truncated": total > WATCH_EVENT_LIMIT,
            "events": events,
        }))
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    async fn component_tree(&self, input: ComponentTreeInput) -> ToolResult {
        let filter = input
            .filter
            .as_deref()
            .map(|p| compile_filter("filter", p))
            .transpose()?;
        let snapshot = self.snapshot().await?;
        let options = TreeOptions {
            root_id: input.root_id,
            max_depth: input.max_depth.unwrap_or(DEFAULT_TREE_DEPTH).max(1),
            filter: filter.as_ref(),
        };
        let tree = build_component_tree(&snapshot, &options).ok_or(ToolError::NotFound {
            kind: "Component",
            id: input.root_id.unwrap_or_default(),
        })?;
        Ok(safe_serialize(&tree))
    }

    async fn dependency_graph(&self, input: DependencyGraphInput) -> ToolResult {
        let focus = match (input.signal_id, input.effect_id) {
            (Some(_), Some(_)) => {
                return Err(ToolError::invalid(
                    "signalId",
                    "pass either signalId or effectId, not both",
                ))
            }
            (Some(id), None) => Some(Focus::Signal(id)),
            (None, Some(id)) => Some(Focus::Effect(id)),
            (None, None) => None,
        };
        let snapshot = self.snapshot().await?;
        let graph = build_dependency_graph(&snapshot, focus, input.direction.unwrap_or_default())
            .map_err(|e| match e {
                GraphError::UnknownSignal(id) => ToolError::NotFound { kind: "Signal", id },
                GraphError::UnknownEffect(id) => ToolError::NotFound { kind: "Effect", id },
            })?;
        Ok(safe_serialize(&graph))
    }

    async fn diagnose(&self, input: DiagnoseInput) -> ToolResult {
        let snapshot = self.snapshot().await?;
        let diagnosis = diagnose(
            &snapshot,
            &self.bridge.errors(None),
            &self.bridge.events(None),
            input.focus.unwrap_or_default(),
            now_ms(),
        );
        Ok(safe_serialize(&diagnosis))
    }

    async fn snapshot_diff(&self, input: SnapshotDiffInput) -> ToolResult {
        match input.action {
            DiffAction::Save => {
                let snapshot = self.snapshot().await?;
                if !self.bridge.save_baseline() {
                    return Err(ToolError::SnapshotUnavailable);
                }
                let saved_at = self.bridge.baseline().map(|b| b.saved_at);
                Ok(json!({
                    "saved": true,
                    "savedAt": saved_at,
                    "counts": snapshot.counts(),
                }))
            }
            DiffAction::Diff => {
                let baseline = self.bridge.baseline().ok_or(ToolError::NoBaseline)?;
                let current = self.snapshot().await?;
                let errors = self
                    .recorded_errors(Some(baseline.saved_at), Some(current.as_ref()))
                    .len();
                let diff = diff_snapshots(&baseline.snapshot, &current, errors);
                let mut payload = safe_serialize(&diff);
                if let Value::Object(map) = &mut payload {
                    map.insert("baselineSavedAt".to_string(), json!(baseline.saved_at));
                }
                Ok(payload)
            }
        }
    }

    // ========================================================================
    // Pass-through
    // ========================================================================

    async fn eval(&self, input: EvalInput) -> ToolResult {
        let timeout_ms = input
            .timeout_ms
            .unwrap_or(EVAL_DEFAULT_TIMEOUT_MS)
            .clamp(EVAL_MIN_TIMEOUT_MS, EVAL_MAX_TIMEOUT_MS);
        let mut data = self
            .bridge
            .send_command(
                Command::Eval {
                    expression: input.expression.clone(),
                },
                Duration::from_millis(timeout_ms),
            )
            .await?;
        let result = if data.get("result").is_some() {
            data["result"].take()
        } else {
            data
        };
        Ok(json!({
            "expression": input.expression,
            "result": result,
            "timeoutMs": timeout_ms,
        }))
    }

    async fn inspect_dom(&self, input: InspectDomInput) -> ToolResult {
        let depth = input
            .depth
            .unwrap_or(INSPECT_DEFAULT_DEPTH)
            .clamp(1, INSPECT_MAX_DEPTH);
        let tree = self
            .passthrough(Command::InspectDom {
                component_id: input.component_id,
                depth,
            })
            .await?;
        Ok(json!({
            "componentId": input.component_id,
            "depth": depth,
            "tree": tree,
        }))
    }

    /// Route state as `{path, params, query}` plus whatever else the router reports.
    async fn get_route(&self) -> ToolResult {
        let route = self.passthrough(Command::GetRoute {}).await?;
        let mut payload = match route {
            Value::Object(map) => map,
            Value::String(path) => {
                let mut map = serde_json::Map::new();
                map.insert("path".to_string(), Value::String(path));
                map
            }
            other => {
                let mut map = serde_json::Map::new();
                map.insert("route".to_string(), other);
                map
            }
        };
        payload.entry("path").or_insert(Value::Null);
        payload.entry("params").or_insert_with(|| json!({}));
        payload.entry("query").or_insert_with(|| json!({}));
        Ok(Value::Object(payload))
    }

    async fn navigate(&self, input: NavigateInput) -> ToolResult {
        let result = self
            .passthrough(Command::Navigate {
                path: input.path.clone(),
                replace: input.replace,
            })
            .await?;
        Ok(json!({
            "path": input.path,
            "replaced": input.replace,
            "result": result,
        }))
    }
}

/// Missing or null arguments deserialize like `{}`.
fn parse<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ToolError::invalid("arguments", e))
}

fn compile_filter(field: &str, pattern: &str) -> Result<Regex, ToolError> {
    Regex::new(pattern).map_err(|e| ToolError::invalid(field, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeConfig, PeerMessage};

    fn tools_with_snapshot(snapshot: Value) -> DiagnosticTools {
        let bridge = Bridge::new(BridgeConfig::default());
        bridge.handle_message(PeerMessage::Snapshot {
            data: serde_json::from_value(snapshot).unwrap(),
        });
        DiagnosticTools::new(bridge)
    }

    fn app() -> Value {
        json!({
            "signals": [
                {"id": 1, "name": "count", "value": 0, "componentId": 10},
                {"id": 2, "name": "todos", "value": []}
            ],
            "effects": [
                {"id": 5, "name": "render", "dependencySignalIds": [1, 2], "runCount": 3}
            ],
            "components": [
                {"id": 10, "name": "App"},
                {"id": 11, "name": "Counter", "parentId": 10}
            ]
        })
    }

    #[tokio::test]
    async fn test_get_signals_filters_by_name() {
        let tools = tools_with_snapshot(app());
        let output = tools.dispatch("get_signals", json!({"name": "^co"})).await;
        assert!(!output.is_error);
        assert_eq!(output.content["count"], 1);
        assert_eq!(output.content["signals"][0]["name"], "count");
    }

    #[tokio::test]
    async fn test_bad_regex_is_invalid_argument() {
        let tools = tools_with_snapshot(app());
        let output = tools.dispatch("get_signals", json!({"name": "("})).await;
        assert!(output.is_error);
        assert!(output.content["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid argument 'name'"));
    }

    #[tokio::test]
    async fn test_no_peer_and_no_snapshot_reports_no_connection() {
        let tools = DiagnosticTools::new(Bridge::new(BridgeConfig::default()));
        let output = tools.dispatch("get_components", Value::Null).await;
        assert!(output.is_error);
        assert_eq!(output.content["error"], "No peer connected");
    }

    #[tokio::test]
    async fn test_connected_without_snapshot_is_unavailable() {
        let bridge = Bridge::new(BridgeConfig {
            command_timeout: Duration::from_millis(20),
            ..Default::default()
        });
        let _peer = bridge.attach_peer();
        let tools = DiagnosticTools::new(bridge);
        let output = tools.dispatch("get_snapshot", json!({})).await;
        assert!(output.is_error);
        assert_eq!(
            output.content["error"],
            "No snapshot has been received from the application yet"
        );
    }

    #[tokio::test]
    async fn test_component_tree_and_unknown_root() {
        let tools = tools_with_snapshot(app());
        let output = tools.dispatch("get_component_tree", json!({})).await;
        assert_eq!(output.content["summary"]["nodeCount"], 2);
        assert_eq!(output.content["tree"][0]["signalCount"], 1);

        let output = tools
            .dispatch("get_component_tree", json!({"rootId": 99}))
            .await;
        assert!(output.is_error);
        assert_eq!(output.content["error"], "Component 99 not found");
    }

    #[tokio::test]
    async fn test_dependency_graph_rejects_double_focus() {
        let tools = tools_with_snapshot(app());
        let output = tools
            .dispatch(
                "get_dependency_graph",
                json!({"signalId": 1, "effectId": 5}),
            )
            .await;
        assert!(output.is_error);

        let output = tools
            .dispatch(
                "get_dependency_graph",
                json!({"signalId": 1, "direction": "downstream"}),
            )
            .await;
        assert_eq!(output.content["summary"]["edgeCount"], 1);
    }

    #[tokio::test]
    async fn test_diff_requires_baseline_then_reports_no_changes() {
        let tools = tools_with_snapshot(app());
        let output = tools
            .dispatch("snapshot_diff", json!({"action": "diff"}))
            .await;
        assert!(output.is_error);
        assert_eq!(output.content["error"], "No baseline saved");

        let saved = tools
            .dispatch("snapshot_diff", json!({"action": "save"}))
            .await;
        assert_eq!(saved.content["saved"], true);
        assert_eq!(saved.content["counts"]["signals"], 2);

        let diff = tools
            .dispatch("snapshot_diff", json!({"action": "diff"}))
            .await;
        assert!(!diff.is_error);
        assert_eq!(diff.content["summary"], "No changes since baseline.");
    }

    #[tokio::test]
    async fn test_diff_counts_snapshot_errors_without_streamed_errors() {
        let tools = tools_with_snapshot(app());
        tools
            .dispatch("snapshot_diff", json!({"action": "save"}))
            .await;

        let mut current = app();
        current["errors"] = json!([
            {"message": "old", "type": "Error", "timestamp": 1},
            {"message": "fresh", "type": "TypeError", "timestamp": now_ms() + 1000}
        ]);
        tools.bridge().handle_message(PeerMessage::Snapshot {
            data: serde_json::from_value(current).unwrap(),
        });

        let diff = tools
            .dispatch("snapshot_diff", json!({"action": "diff"}))
            .await;
        assert!(!diff.is_error, "{}", diff.content);
        assert_eq!(diff.content["errorsSinceBaseline"], 1);

        let errors = tools.dispatch("get_errors", json!({})).await;
        assert_eq!(errors.content["count"], 2);
    }

    #[tokio::test]
    async fn test_diagnose_healthy_app() {
        let tools = tools_with_snapshot(app());
        let output = tools.dispatch("diagnose", json!({"focus": "all"})).await;
        assert_eq!(output.content["severity"], "healthy");
        assert_eq!(output.content["issues"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_watch_clamps_duration() {
        let tools = tools_with_snapshot(app());
        let output = tools.dispatch("watch", json!({"durationMs": 10})).await;
        assert_eq!(output.content["durationMs"], WATCH_MIN_MS);
        assert_eq!(output.content["total"], 0);
        assert_eq!(output.content["truncated"], false);
    }

    #[tokio::test]
    async fn test_get_events_keeps_newest() {
        let tools = tools_with_snapshot(app());
        for i in 0..5 {
            tools.bridge().handle_message(PeerMessage::Event {
                event: "signal:update".to_string(),
                data: json!({"id": i}),
            });
        }
        let output = tools.dispatch("get_events", json!({"limit": 2})).await;
        assert_eq!(output.content["count"], 2);
        assert_eq!(output.content["total"], 5);
        assert_eq!(output.content["events"][1]["data"]["id"], 4);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let tools = tools_with_snapshot(app());
        let output = tools.dispatch("reboot", json!({})).await;
        assert!(output.is_error);
        assert_eq!(output.content["error"], "Unknown tool: reboot");
    }

    #[tokio::test]
    async fn test_every_catalogued_tool_is_dispatched() {
        let tools = tools_with_snapshot(app());
        for def in crate::tools::definitions() {
            let args = match def.name {
                "watch" => json!({"durationMs": WATCH_MIN_MS}),
                _ => Value::Null,
            };
            let output = tools.dispatch(def.name, args).await;
            let error = output.content["error"].as_str().unwrap_or_default();
            assert!(!error.starts_with("Unknown tool"), "{} is not dispatched", def.name);
        }
    }
}
