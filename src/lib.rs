pub mod analysis;
pub mod bridge;
pub mod config;
pub mod instrument;
pub mod snapshot;
pub mod tools;
pub mod util;

pub use bridge::{Bridge, BridgeConfig, BridgeError, Command, PeerMessage, ServerConfig};
pub use config::Config;
pub use instrument::{
    AgentConfig, CommandDispatcher, InstrumentationAgent, ReactiveRuntime, SignalRegistry,
};
pub use snapshot::{Component, Effect, ErrorRecord, LoggedEvent, Signal, Snapshot};
pub use tools::{DiagnosticTools, ToolError, ToolOutput};
