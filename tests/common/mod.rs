//! Shared test utilities for devtap
//!
//! - `FakeApp`: an in-process reactive runtime whose signals live in a registry
//! - `connect_loopback`: wires a `CommandDispatcher` straight into a `Bridge` without a socket

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use devtap::bridge::{Bridge, EventPayload, PeerMessage};
use devtap::instrument::{
    ChangeEvent, CommandDispatcher, HandlerError, ReactiveRuntime, SignalCell, SignalRegistry,
};
use devtap::snapshot::{EntityId, Snapshot};

/// Runtime double: a mutable snapshot plus a change stream.
pub struct FakeApp {
    state: Mutex<Snapshot>,
    route: Mutex<String>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl FakeApp {
    pub fn new(snapshot: Value) -> Arc<Self> {
        let (changes, _) = broadcast::channel(256);
        Arc::new(Self {
            state: Mutex::new(serde_json::from_value(snapshot).expect("valid snapshot")),
            route: Mutex::new("/".to_string()),
            changes,
        })
    }

    /// Registry with one cell per signal in the current state.
    pub fn registry(self: &Arc<Self>) -> Arc<SignalRegistry> {
        let registry = Arc::new(SignalRegistry::new());
        for signal in self.state.lock().signals.clone() {
            registry.register(
                signal.id,
                signal.name,
                Arc::new(AppCell {
                    app: Arc::clone(self),
                    id: signal.id,
                }),
            );
        }
        registry
    }

    pub fn emit(&self, event: &str, data: Value) {
        let _ = self.changes.send(EventPayload {
            event: event.to_string(),
            data,
        });
    }

    pub fn signal_value(&self, id: EntityId) -> Option<Value> {
        self.state.lock().signal(id).map(|s| s.value.clone())
    }
}

#[async_trait]
impl ReactiveRuntime for FakeApp {
    fn snapshot(&self) -> Snapshot {
        self.state.lock().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    async fn eval(&self, expression: &str) -> Result<Value, HandlerError> {
        match expression {
            "location.pathname" => Ok(json!(self.route.lock().clone())),
            other => Err(HandlerError::Failed(format!("cannot evaluate {}", other))),
        }
    }

    async fn route(&self) -> Result<Value, HandlerError> {
        Ok(json!({ "path": self.route.lock().clone(), "params": {}, "query": {} }))
    }

    async fn navigate(&self, path: &str, _replace: bool) -> Result<Value, HandlerError> {
        *self.route.lock() = path.to_string();
        Ok(json!({ "path": path }))
    }
}

/// Cell backed by a signal in the fake app's state; writes emit `signal:update`.
struct AppCell {
    app: Arc<FakeApp>,
    id: EntityId,
}

impl SignalCell for AppCell {
    fn peek(&self) -> Value {
        self.app.signal_value(self.id).unwrap_or(Value::Null)
    }

    fn set(&self, value: Value) -> Result<(), HandlerError> {
        {
            let mut state = self.app.state.lock();
            let signal = state
                .signals
                .iter_mut()
                .find(|s| s.id == self.id)
                .ok_or(HandlerError::SignalNotFound(self.id))?;
            signal.value = value.clone();
        }
        self.app
            .emit("signal:update", json!({ "id": self.id, "value": value }));
        Ok(())
    }
}

/// Attach `app` to `bridge` in-process: push the initial snapshot, answer commands and forward
/// change events until the peer is detached.
pub fn connect_loopback(bridge: &Bridge, app: Arc<FakeApp>) -> JoinHandle<()> {
    let registry = app.registry();
    let mut changes = app.subscribe();
    let dispatcher = CommandDispatcher::new(app.clone(), registry);
    let mut peer = bridge.attach_peer();
    bridge.handle_message(PeerMessage::Snapshot {
        data: app.snapshot(),
    });

    let bridge = bridge.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = peer.outbound.recv() => match frame {
                    Some(frame) => {
                        if let Some(response) = dispatcher.handle_frame(&frame).await {
                            bridge.handle_frame(&serde_json::to_string(&response).unwrap());
                        }
                    }
                    None => break,
                },
                change = changes.recv() => match change {
                    Ok(change) => bridge.handle_message(PeerMessage::Event {
                        event: change.event,
                        data: change.data,
                    }),
                    Err(_) => break,
                },
            }
        }
        bridge.detach_peer(peer.generation);
    })
}

/// The counter app used across tests.
pub fn counter_app() -> Arc<FakeApp> {
    FakeApp::new(json!({
        "signals": [{"id": 1, "name": "count", "value": 0}],
        "effects": [],
        "components": []
    }))
}
