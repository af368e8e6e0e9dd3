//! Tool calls against an in-process application attached to the bridge.
//!
//! Flow: DiagnosticTools -> Bridge -> CommandDispatcher -> FakeApp -> response -> Bridge

use std::time::Duration;

use serde_json::json;

use devtap::bridge::{Bridge, BridgeConfig};
use devtap::tools::DiagnosticTools;

use super::common::{connect_loopback, counter_app, FakeApp};

fn tools() -> DiagnosticTools {
    DiagnosticTools::new(Bridge::new(BridgeConfig::default()))
}

#[tokio::test]
async fn test_list_then_write_signal() {
    let tools = tools();
    let _peer = connect_loopback(tools.bridge(), counter_app());

    let output = tools.dispatch("get_signals", json!({})).await;
    assert!(!output.is_error, "{}", output.content);
    assert_eq!(output.content["count"], 1);
    assert_eq!(output.content["signals"][0]["name"], "count");
    assert_eq!(output.content["signals"][0]["value"], 0);

    let output = tools
        .dispatch("set_signal", json!({"id": 1, "value": 5}))
        .await;
    assert!(!output.is_error, "{}", output.content);
    assert_eq!(output.content["previous"], 0);
    assert_eq!(output.content["current"], 5);
}

#[tokio::test]
async fn test_write_unknown_signal_reports_runtime_failure() {
    let tools = tools();
    let _peer = connect_loopback(tools.bridge(), counter_app());

    let output = tools
        .dispatch("set_signal", json!({"id": 42, "value": 1}))
        .await;
    assert!(output.is_error);
    assert!(output.content["error"]
        .as_str()
        .unwrap()
        .contains("Signal 42 not found"));
    assert!(!output.content["nextSteps"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_writes_are_observed_as_events() {
    let tools = tools();
    let app = counter_app();
    let _peer = connect_loopback(tools.bridge(), app.clone());

    for value in 1..=3 {
        tools
            .dispatch("set_signal", json!({"id": 1, "value": value}))
            .await;
    }
    // Events are forwarded asynchronously.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let output = tools
        .dispatch("get_events", json!({"name": "^signal:"}))
        .await;
    assert_eq!(output.content["count"], 3);
    assert_eq!(output.content["events"][2]["data"]["value"], 3);
    assert_eq!(app.signal_value(1), Some(json!(3)));
}

#[tokio::test]
async fn test_diff_sees_written_value() {
    let tools = tools();
    let _peer = connect_loopback(tools.bridge(), counter_app());

    let saved = tools
        .dispatch("snapshot_diff", json!({"action": "save"}))
        .await;
    assert!(!saved.is_error, "{}", saved.content);

    tools
        .dispatch("set_signal", json!({"id": 1, "value": 9}))
        .await;
    // Step past the snapshot dedup window so the diff fetches fresh state.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let diff = tools
        .dispatch("snapshot_diff", json!({"action": "diff"}))
        .await;
    assert!(!diff.is_error, "{}", diff.content);
    assert_eq!(diff.content["signalsChanged"][0]["previousValue"], 0);
    assert_eq!(diff.content["signalsChanged"][0]["currentValue"], 9);
    assert_eq!(diff.content["summary"], "1 signal changed.");
}

#[tokio::test]
async fn test_pass_through_commands() {
    let tools = tools();
    let _peer = connect_loopback(tools.bridge(), counter_app());

    let navigated = tools
        .dispatch("navigate", json!({"path": "/settings", "replace": true}))
        .await;
    assert_eq!(navigated.content["path"], "/settings");
    assert_eq!(navigated.content["replaced"], true);

    let route = tools.dispatch("get_route", json!({})).await;
    assert_eq!(route.content["path"], "/settings");
    assert_eq!(route.content["query"], json!({}));

    let eval = tools
        .dispatch("eval", json!({"expression": "location.pathname"}))
        .await;
    assert!(!eval.is_error, "{}", eval.content);
    assert_eq!(eval.content["expression"], "location.pathname");
    assert_eq!(eval.content["result"], "/settings");
    assert_eq!(eval.content["timeoutMs"], 5000);

    // The fake app does not implement DOM inspection.
    let dom = tools
        .dispatch("inspect_dom", json!({"componentId": 1, "depth": 50}))
        .await;
    assert!(dom.is_error);
    assert!(dom.content["error"]
        .as_str()
        .unwrap()
        .contains("not supported"));
    assert!(dom.content["hint"]
        .as_str()
        .unwrap()
        .contains("inspect-dom"));
}

#[tokio::test]
async fn test_eval_failure_suggests_expression_fixes() {
    let tools = tools();
    let _peer = connect_loopback(tools.bridge(), counter_app());

    let output = tools
        .dispatch("eval", json!({"expression": "window.foo"}))
        .await;
    assert!(output.is_error);
    let steps: Vec<&str> = output.content["nextSteps"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s.as_str())
        .collect();
    assert!(steps.iter().any(|s| s.contains("expression syntax")));
    assert!(!steps.iter().any(|s| s.contains("get_signals or get_snapshot")));
}

#[tokio::test]
async fn test_watch_returns_events_from_its_window() {
    let tools = tools();
    let app = counter_app();
    let _peer = connect_loopback(tools.bridge(), app.clone());

    app.emit("signal:update", json!({"before": true}));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let watcher = {
        let tools = tools.clone();
        tokio::spawn(async move {
            tools
                .dispatch("watch", json!({"durationMs": 600, "filter": "^signal"}))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    for n in 0..250 {
        app.emit("signal:update", json!({"n": n}));
    }
    app.emit("other", json!({}));

    let output = watcher.await.unwrap();
    assert!(!output.is_error, "{}", output.content);
    assert_eq!(output.content["total"], 250);
    assert_eq!(output.content["truncated"], true);
    let events = output.content["events"].as_array().unwrap();
    assert_eq!(events.len(), 200);
    assert_eq!(events[0]["data"]["n"], 0);
    assert!(events.iter().all(|e| e["event"] == "signal:update"));
}

#[tokio::test]
async fn test_diagnose_and_graph_over_live_state() {
    let tools = tools();
    let app = FakeApp::new(json!({
        "signals": [
            {"id": 1, "name": "count", "value": 0},
            {"id": 2, "name": "unused", "value": null}
        ],
        "effects": [
            {"id": 10, "name": "render", "dependencySignalIds": [1], "runCount": 80}
        ],
        "components": [{"id": 100, "name": "App"}]
    }));
    let _peer = connect_loopback(tools.bridge(), app);

    let diagnosis = tools.dispatch("diagnose", json!({})).await;
    assert_eq!(diagnosis.content["severity"], "warning");

    let graph = tools
        .dispatch("get_dependency_graph", json!({"effectId": 10, "direction": "upstream"}))
        .await;
    assert_eq!(graph.content["edges"], json!([{"from": "signal:1", "to": "effect:10"}]));

    let status = tools.dispatch("bridge_status", json!({})).await;
    assert_eq!(status.content["connected"], true);
    assert_eq!(status.content["hasSnapshot"], true);
}

#[tokio::test]
async fn test_disconnect_mid_session() {
    let tools = tools();
    let peer = connect_loopback(tools.bridge(), counter_app());
    peer.abort();
    let _ = peer.await;

    // The aborted loopback never detached; simulate the transport noticing.
    let generation = tools.bridge().attach_peer().generation;
    tools.bridge().detach_peer(generation);

    let output = tools.dispatch("get_route", json!({})).await;
    assert!(output.is_error);
    assert_eq!(output.content["error"], "No peer connected");

    // Cached state is still readable.
    let signals = tools.dispatch("get_signals", json!({})).await;
    assert!(!signals.is_error);
}
