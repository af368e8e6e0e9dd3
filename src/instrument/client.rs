//! Connection loop of the instrumentation agent.
//!
//! The agent dials the bridge, pushes one full snapshot, then forwards runtime changes as
//! `event`/`events` frames and answers correlated commands until the socket drops. It then
//! reconnects with exponential backoff.

use std::sync::Arc;

use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::backoff::ReconnectPolicy;
use super::dispatch::CommandDispatcher;
use super::error::AgentError;
use super::registry::SignalRegistry;
use super::runtime::ReactiveRuntime;
use crate::bridge::PeerMessage;

type BridgeSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Bridge endpoint, e.g. `ws://127.0.0.1:9229/ws`.
    pub url: String,
    pub policy: ReconnectPolicy,
    /// Maximum number of queued changes coalesced into one `events` frame.
    pub max_batch: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9229/ws".to_string(),
            policy: ReconnectPolicy::default(),
            max_batch: 100,
        }
    }
}

pub struct InstrumentationAgent {
    config: AgentConfig,
    dispatcher: Arc<CommandDispatcher>,
}

impl InstrumentationAgent {
    pub fn new(
        config: AgentConfig,
        runtime: Arc<dyn ReactiveRuntime>,
        registry: Arc<SignalRegistry>,
    ) -> Self {
        Self {
            config,
            dispatcher: Arc::new(CommandDispatcher::new(runtime, registry)),
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Connect, serve, reconnect; returns once `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let policy = self.config.policy;
        let url = self.config.url.as_str();
        let mut failures: u32 = 0;

        loop {
            let attempt = tokio::select! {
                _ = shutdown.cancelled() => break,
                attempt = connect_async(url) => attempt,
            };

            match attempt {
                Ok((socket, _)) => {
                    if failures > policy.quiet_after {
                        tracing::info!(url, failures, "Reconnected to bridge");
                    } else {
                        tracing::info!(url, "Connected to bridge");
                    }
                    failures = 0;

                    match self.run_session(socket, &shutdown).await {
                        Ok(()) => tracing::info!(url, "Bridge connection closed"),
                        Err(e) => tracing::warn!(url, error = %e, "Bridge connection lost"),
                    }
                    if shutdown.is_cancelled() {
                        break;
                    }
                    if !sleep_or_cancel(policy.base_delay, &shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = policy.delay(failures);
                    let error = AgentError::Connect(e);
                    if failures == policy.quiet_after {
                        tracing::warn!(
                            url,
                            failures,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Bridge unavailable; further retries will be silent"
                        );
                    } else if policy.should_log(failures) {
                        tracing::warn!(
                            url,
                            failures,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Bridge unavailable; retrying"
                        );
                    } else {
                        tracing::debug!(url, failures, error = %error, "Reconnect attempt failed");
                    }
                    if !sleep_or_cancel(delay, &shutdown).await {
                        break;
                    }
                }
            }
        }
    }

    async fn run_session(
        &self,
        socket: BridgeSocket,
        shutdown: &CancellationToken,
    ) -> Result<(), AgentError> {
        let (mut sink, mut stream) = socket.split();
        let runtime = self.dispatcher.runtime().clone();

        let mut changes = runtime.subscribe();
        send_message(
            &mut sink,
            &PeerMessage::Snapshot {
                data: runtime.snapshot(),
            },
        )
        .await?;

        let mut changes_open = true;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    if let Err(e) = sink.close().await {
                        tracing::debug!(error = %e, "Failed to close bridge socket");
                    }
                    return Ok(());
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(response) = self.dispatcher.handle_frame(text.as_str()).await {
                            send_message(&mut sink, &response).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(AgentError::Socket(e)),
                },
                change = changes.recv(), if changes_open => match change {
                    Ok(first) => {
                        let mut batch = vec![first];
                        while batch.len() < self.config.max_batch {
                            match changes.try_recv() {
                                Ok(next) => batch.push(next),
                                Err(TryRecvError::Lagged(skipped)) => {
                                    tracing::warn!(skipped, "Change stream lagged; events dropped");
                                }
                                Err(_) => break,
                            }
                        }
                        let message = if batch.len() == 1 {
                            let change = batch.remove(0);
                            PeerMessage::Event {
                                event: change.event,
                                data: change.data,
                            }
                        } else {
                            PeerMessage::Events { batch }
                        };
                        send_message(&mut sink, &message).await?;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Change stream lagged; events dropped");
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Runtime change stream ended");
                        changes_open = false;
                    }
                },
            }
        }
    }
}

async fn send_message<S>(sink: &mut S, message: &PeerMessage) -> Result<(), AgentError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(message)?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(AgentError::Socket)
}

/// Sleep for `delay`; false if shutdown was requested first.
async fn sleep_or_cancel(delay: std::time::Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
