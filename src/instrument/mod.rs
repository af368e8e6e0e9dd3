//! In-process side of the protocol: runs inside the instrumented application, pushes state
//! to the bridge and executes the commands it receives.

pub mod backoff;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod runtime;

pub use backoff::ReconnectPolicy;
pub use client::{AgentConfig, InstrumentationAgent};
pub use dispatch::CommandDispatcher;
pub use error::{AgentError, HandlerError};
pub use registry::{RegistryEntry, SignalCell, SignalRegistry, ValueCell};
pub use runtime::{ChangeEvent, ReactiveRuntime};
