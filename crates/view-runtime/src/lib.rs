//! Tokio driver for the chat view synchronization core.
//!
//! Hosts the engines from `view-core` on a single task, spawns keyed fetches
//! against the remote collaborator traits, and relays events to the rendering
//! layer through the shared channel pair.

/// Remote collaborator traits.
pub mod api;
/// Environment-backed runtime configuration.
pub mod config;
/// The select-loop driver.
pub mod runtime;

pub use api::{ChatApi, RealtimePort};
pub use config::{ConfigError, RuntimeConfig};
pub use runtime::{RuntimeHandle, ViewRuntime};
