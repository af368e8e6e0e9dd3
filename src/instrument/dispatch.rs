//! Executes bridge commands against the live runtime.

use std::sync::Arc;

use serde_json::{json, Value};

use super::error::HandlerError;
use super::registry::SignalRegistry;
use super::runtime::ReactiveRuntime;
use crate::bridge::{Command, InboundCommand, PeerMessage};
use crate::snapshot::safe_serialize;

pub struct CommandDispatcher {
    runtime: Arc<dyn ReactiveRuntime>,
    registry: Arc<SignalRegistry>,
}

impl CommandDispatcher {
    pub fn new(runtime: Arc<dyn ReactiveRuntime>, registry: Arc<SignalRegistry>) -> Self {
        Self { runtime, registry }
    }

    pub fn runtime(&self) -> &Arc<dyn ReactiveRuntime> {
        &self.runtime
    }

    /// Handle one command frame and build the response frame.
    ///
    /// Returns `None` only when the frame carries no usable correlation id, in which case
    /// there is nobody to answer. Every other outcome, handler failures included, produces a
    /// `response` whose data holds either the result or `{"error": ...}`.
    pub async fn handle_frame(&self, text: &str) -> Option<PeerMessage> {
        let inbound = match InboundCommand::parse(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unreadable command frame");
                return None;
            }
        };

        let data = match inbound.decode() {
            Ok(command) => match self.execute(command).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!(command = %inbound.command, error = %e, "Command handler failed");
                    json!({ "error": e.to_string() })
                }
            },
            Err(e) if Command::NAMES.contains(&inbound.command.as_str()) => {
                json!({ "error": format!("Invalid arguments for {}: {}", inbound.command, e) })
            }
            Err(_) => json!({ "error": format!("Unknown command: {}", inbound.command) }),
        };

        Some(PeerMessage::Response {
            correlation_id: inbound.correlation_id,
            data,
        })
    }

    pub async fn execute(&self, command: Command) -> Result<Value, HandlerError> {
        match command {
            Command::GetSnapshot {} => Ok(safe_serialize(&self.runtime.snapshot())),
            Command::GetQueryCache {} => self.runtime.query_cache().await,
            Command::SetSignal { id, value } => {
                let entry = self
                    .registry
                    .get(id)
                    .ok_or(HandlerError::SignalNotFound(id))?;
                let previous = entry.cell.peek();
                entry.cell.set(value)?;
                let current = entry.cell.peek();
                tracing::debug!(id, name = %entry.name, "Signal written");
                Ok(json!({ "previous": previous, "current": current }))
            }
            Command::InvalidateQuery { key } => {
                let invalidated = self.runtime.invalidate_query(&key).await?;
                Ok(json!({ "invalidated": invalidated, "key": key }))
            }
            Command::Eval { expression } => {
                let result = self.runtime.eval(&expression).await?;
                Ok(json!({ "result": result }))
            }
            Command::InspectDom {
                component_id,
                depth,
            } => self.runtime.inspect_dom(component_id, depth).await,
            Command::GetRoute {} => self.runtime.route().await,
            Command::Navigate { path, replace } => self.runtime.navigate(&path, replace).await,
        }
    }
}
