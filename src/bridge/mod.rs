//! Bridge side of the protocol: the peer slot, command correlation and state storage.

pub mod broker;
pub mod error;
pub mod messages;
pub mod server;
pub mod store;

pub use broker::{
    Bridge, BridgeConfig, BridgeStatus, PeerConnection, DEFAULT_COMMAND_TIMEOUT,
    SNAPSHOT_DEDUP_WINDOW,
};
pub use error::BridgeError;
pub use messages::{Command, CorrelationId, EventPayload, InboundCommand, PeerMessage};
pub use server::{build_router, spawn_server, ServerConfig};
pub use store::{BoundedLog, StateStore};
