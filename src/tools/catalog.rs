//! Names, descriptions and argument schemas of every diagnostic tool.

use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn no_arguments() -> Value {
    object(json!({}), &[])
}

fn tool(name: &'static str, description: &'static str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name,
        description,
        input_schema,
    }
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "get_signals",
            "List signals with their current values, optionally filtered by id or name pattern",
            object(
                json!({
                    "id": {"type": "integer", "description": "Only the signal with this id"},
                    "name": {"type": "string", "description": "Regular expression matched against signal names"}
                }),
                &[],
            ),
        ),
        tool(
            "get_effects",
            "List effects with their dependencies and run counts",
            object(
                json!({
                    "minRunCount": {"type": "integer", "description": "Only effects that ran at least this many times"}
                }),
                &[],
            ),
        ),
        tool("get_components", "List mounted components", no_arguments()),
        tool(
            "get_snapshot",
            "Full state snapshot: signals, effects, components and errors",
            no_arguments(),
        ),
        tool(
            "get_errors",
            "Errors captured from the application",
            object(
                json!({
                    "since": {"type": "integer", "description": "Only errors newer than this timestamp (ms since epoch)"}
                }),
                &[],
            ),
        ),
        tool(
            "get_events",
            "Recent state-change events recorded by the bridge",
            object(
                json!({
                    "since": {"type": "integer", "description": "Only events newer than this timestamp (ms since epoch)"},
                    "name": {"type": "string", "description": "Regular expression matched against event names"},
                    "limit": {"type": "integer", "description": "Return at most this many of the newest events"}
                }),
                &[],
            ),
        ),
        tool(
            "get_query_cache",
            "Entries of the application's query cache",
            no_arguments(),
        ),
        tool(
            "set_signal",
            "Write a new value into a signal and return the previous and current value",
            object(
                json!({
                    "id": {"type": "integer", "description": "Signal id"},
                    "value": {"description": "New value (any JSON)"}
                }),
                &["id", "value"],
            ),
        ),
        tool(
            "invalidate_query",
            "Invalidate a query cache entry so it refetches",
            object(
                json!({
                    "key": {"type": "string", "description": "Query key"}
                }),
                &["key"],
            ),
        ),
        tool(
            "watch",
            "Wait for a duration and return the events recorded meanwhile",
            object(
                json!({
                    "durationMs": {"type": "integer", "minimum": 500, "maximum": 30000, "default": 5000},
                    "filter": {"type": "string", "description": "Regular expression matched against event names"}
                }),
                &[],
            ),
        ),
        tool(
            "get_component_tree",
            "Component hierarchy with per-component signal and effect counts",
            object(
                json!({
                    "rootId": {"type": "integer", "description": "Start from this component"},
                    "maxDepth": {"type": "integer", "minimum": 1, "default": 10},
                    "filter": {"type": "string", "description": "Keep subtrees whose component names match this regular expression"}
                }),
                &[],
            ),
        ),
        tool(
            "get_dependency_graph",
            "Signal to effect dependency edges, optionally one hop around a signal or effect",
            object(
                json!({
                    "signalId": {"type": "integer"},
                    "effectId": {"type": "integer"},
                    "direction": {"type": "string", "enum": ["upstream", "downstream", "both"], "default": "both"}
                }),
                &[],
            ),
        ),
        tool(
            "diagnose",
            "Run health checks for errors, performance and reactivity problems",
            object(
                json!({
                    "focus": {"type": "string", "enum": ["errors", "performance", "reactivity", "all"], "default": "all"}
                }),
                &[],
            ),
        ),
        tool(
            "snapshot_diff",
            "Save a baseline snapshot, or diff the current state against it",
            object(
                json!({
                    "action": {"type": "string", "enum": ["save", "diff"]}
                }),
                &["action"],
            ),
        ),
        tool(
            "eval",
            "Evaluate an expression inside the running application",
            object(
                json!({
                    "expression": {"type": "string"},
                    "timeoutMs": {"type": "integer", "minimum": 100, "maximum": 30000, "default": 5000}
                }),
                &["expression"],
            ),
        ),
        tool(
            "inspect_dom",
            "Rendered output of a component",
            object(
                json!({
                    "componentId": {"type": "integer"},
                    "depth": {"type": "integer", "minimum": 1, "maximum": 10, "default": 3}
                }),
                &["componentId"],
            ),
        ),
        tool("get_route", "Current route of the application", no_arguments()),
        tool(
            "navigate",
            "Navigate the application to a path",
            object(
                json!({
                    "path": {"type": "string"},
                    "replace": {"type": "boolean", "default": false}
                }),
                &["path"],
            ),
        ),
        tool(
            "bridge_status",
            "Connection state of the bridge and sizes of its logs",
            no_arguments(),
        ),
    ]
}
