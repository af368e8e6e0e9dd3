//! Seam between the agent and the reactive runtime it instruments.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use super::error::HandlerError;
use crate::bridge::EventPayload;
use crate::snapshot::{EntityId, Snapshot};

/// A change notification emitted by the runtime.
pub type ChangeEvent = EventPayload;

/// What the agent needs from the instrumented runtime.
///
/// Only [`snapshot`](ReactiveRuntime::snapshot) and [`subscribe`](ReactiveRuntime::subscribe)
/// are required. The remaining hooks back the pass-through commands and default to
/// reporting that the runtime does not support them.
#[async_trait]
pub trait ReactiveRuntime: Send + Sync {
    /// Full copy of the current state.
    fn snapshot(&self) -> Snapshot;

    /// Stream of change notifications. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    /// Auxiliary cache state (e.g. a data-fetching query cache).
    async fn query_cache(&self) -> Result<Value, HandlerError> {
        Ok(json!({ "queries": [] }))
    }

    /// Force-invalidate one cache entry. Returns whether the key existed.
    async fn invalidate_query(&self, _key: &str) -> Result<bool, HandlerError> {
        Err(HandlerError::Unsupported("Query invalidation"))
    }

    async fn eval(&self, _expression: &str) -> Result<Value, HandlerError> {
        Err(HandlerError::Unsupported("Expression evaluation"))
    }

    /// Rendered output of a component, `depth` levels deep.
    async fn inspect_dom(
        &self,
        _component_id: EntityId,
        _depth: u32,
    ) -> Result<Value, HandlerError> {
        Err(HandlerError::Unsupported("DOM inspection"))
    }

    /// Current navigation state.
    async fn route(&self) -> Result<Value, HandlerError> {
        Err(HandlerError::Unsupported("Route inspection"))
    }

    async fn navigate(&self, _path: &str, _replace: bool) -> Result<Value, HandlerError> {
        Err(HandlerError::Unsupported("Navigation"))
    }
}
