//! Correlation broker: pairs outbound commands with inbound responses over the single peer slot
//! and routes pushed snapshots and events into the [`StateStore`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::BridgeError;
use super::messages::{Command, CorrelationId, EventPayload, PeerMessage};
use super::store::StateStore;
use crate::snapshot::{Baseline, ErrorRecord, LoggedEvent, Snapshot, TimestampMs};
use crate::util::time::now_ms;

/// Two snapshot reads closer together than this share one fetch.
pub const SNAPSHOT_DEDUP_WINDOW: Duration = Duration::from_millis(100);

/// Deadline applied when the caller does not pick one.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(5000);

/// Event name whose payloads are also recorded in the error log.
const ERROR_EVENT: &str = "error";

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub command_timeout: Duration,
    pub event_capacity: usize,
    pub error_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            event_capacity: 1000,
            error_capacity: 100,
        }
    }
}

type Reply = oneshot::Sender<Result<Value, BridgeError>>;

struct PendingCommand {
    command: &'static str,
    reply: Reply,
}

struct PeerSlot {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
}

/// Receiving half handed to the transport when a peer attaches.
pub struct PeerConnection {
    pub generation: u64,
    pub outbound: mpsc::UnboundedReceiver<String>,
}

struct BridgeInner {
    config: BridgeConfig,
    instance: String,
    next_correlation: AtomicU64,
    next_generation: AtomicU64,
    peer: Mutex<Option<PeerSlot>>,
    pending: Mutex<HashMap<CorrelationId, PendingCommand>>,
    store: Mutex<StateStore>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

/// Removes a pending entry however the awaiting future ends (reply, timeout, drop).
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<CorrelationId, PendingCommand>>,
    id: CorrelationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Connection and state broker shared by the transport and the tool layer.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

/// Connection and store health, reported by the `bridge_status` tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    pub connected: bool,
    pub has_snapshot: bool,
    pub snapshot_age_ms: Option<u64>,
    pub pending_commands: usize,
    pub events: usize,
    pub errors: usize,
    pub has_baseline: bool,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        let store = StateStore::new(config.event_capacity, config.error_capacity);
        let mut instance = Uuid::new_v4().simple().to_string();
        instance.truncate(8);
        Self {
            inner: Arc::new(BridgeInner {
                config,
                instance,
                next_correlation: AtomicU64::new(1),
                next_generation: AtomicU64::new(1),
                peer: Mutex::new(None),
                pending: Mutex::new(HashMap::new()),
                store: Mutex::new(store),
                closed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// True while a peer occupies the slot.
    pub fn is_connected(&self) -> bool {
        self.inner.peer.lock().is_some()
    }

    // ========================================================================
    // Peer slot
    // ========================================================================

    /// Occupy the peer slot. A previous peer's bookkeeping is replaced without notice.
    pub fn attach_peer(&self) -> PeerConnection {
        let (tx, rx) = mpsc::unbounded_channel();
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let previous = self.inner.peer.lock().replace(PeerSlot {
            generation,
            outbound: tx,
        });
        if let Some(previous) = previous {
            tracing::info!(
                previous = previous.generation,
                generation,
                "Replacing existing peer connection"
            );
        } else {
            tracing::info!(generation, "Peer connected");
        }
        PeerConnection {
            generation,
            outbound: rx,
        }
    }

    /// Release the slot if `generation` still owns it and fail every in-flight command.
    pub fn detach_peer(&self, generation: u64) {
        let released = {
            let mut slot = self.inner.peer.lock();
            if slot.as_ref().is_some_and(|s| s.generation == generation) {
                *slot = None;
                true
            } else {
                false
            }
        };

        if released {
            let rejected = self.reject_all(|command| BridgeError::Disconnected {
                command: command.to_string(),
            });
            tracing::info!(generation, rejected, "Peer disconnected");
        } else {
            tracing::debug!(generation, "Superseded peer connection closed");
        }
    }

    fn reject_all(&self, error: impl Fn(&str) -> BridgeError) -> usize {
        let drained: Vec<PendingCommand> = self
            .inner
            .pending
            .lock()
            .drain()
            .map(|(_, pending)| pending)
            .collect();
        let count = drained.len();
        for pending in drained {
            let err = error(pending.command);
            if pending.reply.send(Err(err)).is_err() {
                tracing::debug!(command = pending.command, "Caller gone before rejection");
            }
        }
        count
    }

    // ========================================================================
    // Inbound routing
    // ========================================================================

    /// Route one text frame from the peer. Malformed frames are dropped.
    pub fn handle_frame(&self, text: &str) {
        if let Some(message) = PeerMessage::parse(text) {
            self.handle_message(message);
        }
    }

    pub fn handle_message(&self, message: PeerMessage) {
        match message {
            PeerMessage::Snapshot { data } => {
                self.inner.store.lock().set_snapshot(data);
            }
            PeerMessage::Event { event, data } => self.record_event(event, data),
            PeerMessage::Events { batch } => {
                for EventPayload { event, data } in batch {
                    self.record_event(event, data);
                }
            }
            PeerMessage::Response {
                correlation_id,
                data,
            } => self.resolve(correlation_id, data),
        }
    }

    fn record_event(&self, event: String, data: Value) {
        let timestamp = now_ms();
        let mut store = self.inner.store.lock();
        if event == ERROR_EVENT {
            store.push_error(ErrorRecord::from_event_data(&data, timestamp));
        }
        store.push_event(LoggedEvent {
            event,
            data,
            timestamp,
        });
    }

    fn resolve(&self, correlation_id: CorrelationId, data: Value) {
        let Some(pending) = self.inner.pending.lock().remove(&correlation_id) else {
            tracing::debug!(%correlation_id, "Ignoring response for unknown or settled command");
            return;
        };

        let result = match reported_failure(&data) {
            Some(message) => Err(BridgeError::RuntimeCommandFailure {
                command: pending.command.to_string(),
                message,
            }),
            None => Ok(data),
        };
        if pending.reply.send(result).is_err() {
            tracing::debug!(%correlation_id, "Caller gone before response arrived");
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn next_correlation_id(&self) -> CorrelationId {
        let n = self.inner.next_correlation.fetch_add(1, Ordering::Relaxed);
        CorrelationId::new(format!("{}-{}", self.inner.instance, n))
    }

    /// Send `command` to the peer and wait for its response.
    ///
    /// Fails immediately with [`BridgeError::NoConnection`] when no peer is attached. Otherwise
    /// resolves with the response data, or fails on timeout, disconnect or a failure reported
    /// by the application.
    pub async fn send_command(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<Value, BridgeError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(BridgeError::Closed);
        }
        let name = command.name();
        let id = self.next_correlation_id();
        let frame = command.encode(&id)?;

        let (tx, rx) = oneshot::channel();
        // Registered under the peer lock so a concurrent detach either sees the entry and
        // rejects it, or has already emptied the slot.
        let outbound = {
            let slot = self.inner.peer.lock();
            let Some(slot) = slot.as_ref() else {
                return Err(BridgeError::NoConnection);
            };
            self.inner.pending.lock().insert(
                id.clone(),
                PendingCommand {
                    command: name,
                    reply: tx,
                },
            );
            slot.outbound.clone()
        };
        let _guard = PendingGuard {
            pending: &self.inner.pending,
            id: id.clone(),
        };

        if outbound.send(frame).is_err() {
            return Err(BridgeError::NoConnection);
        }
        tracing::debug!(correlation_id = %id, command = name, "Command sent");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::Disconnected {
                command: name.to_string(),
            }),
            Err(_) => {
                tracing::debug!(correlation_id = %id, command = name, "Command timed out");
                Err(BridgeError::CommandTimeout {
                    command: name.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// [`Bridge::send_command`] with the configured default deadline.
    pub async fn request(&self, command: Command) -> Result<Value, BridgeError> {
        self.send_command(command, self.inner.config.command_timeout)
            .await
    }

    pub fn pending_commands(&self) -> usize {
        self.inner.pending.lock().len()
    }

    // ========================================================================
    // Snapshot cache
    // ========================================================================

    /// Last snapshot received, without refreshing.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.store.lock().snapshot()
    }

    /// Cached snapshot if fetched within [`SNAPSHOT_DEDUP_WINDOW`], otherwise a fresh one.
    ///
    /// A failed refresh falls back to the last known snapshot. Concurrent refreshes are not
    /// coordinated; the last one to finish wins the cache.
    pub async fn get_or_refresh_snapshot(&self) -> Option<Arc<Snapshot>> {
        {
            let store = self.inner.store.lock();
            if let (Some(snapshot), Some(at)) = (store.snapshot(), store.fetched_at()) {
                if at.elapsed() < SNAPSHOT_DEDUP_WINDOW {
                    return Some(snapshot);
                }
            }
        }

        match self.request(Command::GetSnapshot {}).await {
            Ok(data) => match serde_json::from_value::<Snapshot>(data) {
                Ok(snapshot) => Some(self.inner.store.lock().set_snapshot(snapshot)),
                Err(e) => {
                    tracing::warn!(error = %e, "Peer returned an unreadable snapshot");
                    self.snapshot()
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "Snapshot refresh failed; using last known snapshot");
                self.snapshot()
            }
        }
    }

    // ========================================================================
    // Baseline and logs
    // ========================================================================

    /// Deep-copy the current snapshot as the baseline. False when nothing was received yet.
    pub fn save_baseline(&self) -> bool {
        self.inner.store.lock().save_baseline(now_ms())
    }

    pub fn baseline(&self) -> Option<Arc<Baseline>> {
        self.inner.store.lock().baseline()
    }

    pub fn events(&self, since: Option<TimestampMs>) -> Vec<LoggedEvent> {
        self.inner.store.lock().events(since)
    }

    pub fn errors(&self, since: Option<TimestampMs>) -> Vec<ErrorRecord> {
        self.inner.store.lock().errors(since)
    }

    pub fn status(&self) -> BridgeStatus {
        let connected = self.is_connected();
        let pending_commands = self.pending_commands();
        let store = self.inner.store.lock();
        BridgeStatus {
            connected,
            has_snapshot: store.snapshot().is_some(),
            snapshot_age_ms: store
                .fetched_at()
                .map(|at| at.elapsed().as_millis() as u64),
            pending_commands,
            events: store.event_count(),
            errors: store.error_count(),
            has_baseline: store.baseline().is_some(),
        }
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Reject all pending commands, release the peer slot and stop the transport.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.peer.lock().take();
        let rejected = self.reject_all(|_| BridgeError::Closed);
        self.inner.shutdown.cancel();
        tracing::info!(rejected, "Bridge closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Resolves once [`Bridge::close`] has been called.
    pub async fn closed(&self) {
        self.inner.shutdown.cancelled().await
    }
}

/// `{"error": "..."}` is how the application reports a failed handler.
fn reported_failure(data: &Value) -> Option<String> {
    let error = data.as_object()?.get("error")?;
    match error {
        Value::Null | Value::Bool(false) => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}
