//! Registry of live signal cells, keyed by signal id.
//!
//! Created when instrumentation starts and handed to the agent; dropping it on teardown
//! forgets every cell.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::error::HandlerError;
use crate::snapshot::EntityId;

/// A gettable/settable reactive cell.
pub trait SignalCell: Send + Sync {
    /// Read the value without registering a dependency.
    fn peek(&self) -> Value;

    fn set(&self, value: Value) -> Result<(), HandlerError>;
}

/// Plain in-memory cell.
#[derive(Debug, Default)]
pub struct ValueCell {
    value: RwLock<Value>,
}

impl ValueCell {
    pub fn new(value: Value) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }
}

impl SignalCell for ValueCell {
    fn peek(&self) -> Value {
        self.value.read().clone()
    }

    fn set(&self, value: Value) -> Result<(), HandlerError> {
        *self.value.write() = value;
        Ok(())
    }
}

#[derive(Clone)]
pub struct RegistryEntry {
    pub name: String,
    pub cell: Arc<dyn SignalCell>,
}

#[derive(Default)]
pub struct SignalRegistry {
    entries: RwLock<HashMap<EntityId, RegistryEntry>>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cell, replacing any previous cell under the same id.
    pub fn register(&self, id: EntityId, name: impl Into<String>, cell: Arc<dyn SignalCell>) {
        self.entries.write().insert(
            id,
            RegistryEntry {
                name: name.into(),
                cell,
            },
        );
    }

    pub fn unregister(&self, id: EntityId) -> bool {
        self.entries.write().remove(&id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<RegistryEntry> {
        self.entries.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
