//! Bridge server and instrumentation agent over a real WebSocket.

use std::time::{Duration, Instant};

use serde_json::json;
use tokio_util::sync::CancellationToken;

use devtap::bridge::{spawn_server, Bridge, BridgeConfig, ServerConfig};
use devtap::instrument::{AgentConfig, InstrumentationAgent, ReconnectPolicy};
use devtap::tools::DiagnosticTools;

use super::common::counter_app;

async fn wait_until(mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "condition not met within 5s");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        base_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        quiet_after: 2,
    }
}

#[tokio::test]
async fn test_agent_round_trip_over_socket() {
    let bridge = Bridge::new(BridgeConfig::default());
    let (addr, server) = spawn_server(
        bridge.clone(),
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
    )
    .await
    .unwrap();

    let app = counter_app();
    let shutdown = CancellationToken::new();
    let agent = InstrumentationAgent::new(
        AgentConfig {
            url: format!("ws://{}/ws", addr),
            policy: fast_policy(),
            ..Default::default()
        },
        app.clone(),
        app.registry(),
    )
    .spawn(shutdown.clone());

    wait_until(|| bridge.snapshot().is_some()).await;
    assert!(bridge.is_connected());

    let tools = DiagnosticTools::new(bridge.clone());
    let signals = tools.dispatch("get_signals", json!({})).await;
    assert_eq!(signals.content["signals"][0]["name"], "count");
    assert_eq!(signals.content["signals"][0]["value"], 0);

    let written = tools
        .dispatch("set_signal", json!({"id": 1, "value": 5}))
        .await;
    assert!(!written.is_error, "{}", written.content);
    assert_eq!(written.content["previous"], 0);
    assert_eq!(written.content["current"], 5);

    // The write streams back as an event.
    wait_until(|| !bridge.events(None).is_empty()).await;
    assert_eq!(bridge.events(None)[0].event, "signal:update");

    shutdown.cancel();
    agent.await.unwrap();
    wait_until(|| !bridge.is_connected()).await;

    bridge.close();
    server.await.unwrap();
}

#[tokio::test]
async fn test_agent_connects_once_bridge_appears() {
    // Reserve a port, release it, and start the agent before anything listens there.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let app = counter_app();
    let shutdown = CancellationToken::new();
    let agent = InstrumentationAgent::new(
        AgentConfig {
            url: format!("ws://127.0.0.1:{}/", port),
            policy: fast_policy(),
            ..Default::default()
        },
        app.clone(),
        app.registry(),
    )
    .spawn(shutdown.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;

    let bridge = Bridge::new(BridgeConfig::default());
    let (_, server) = spawn_server(
        bridge.clone(),
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
        },
    )
    .await
    .unwrap();

    wait_until(|| bridge.is_connected() && bridge.snapshot().is_some()).await;

    shutdown.cancel();
    agent.await.unwrap();
    bridge.close();
    server.await.unwrap();
}
