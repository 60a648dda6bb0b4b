//! Presence Client - realtime presence over a single WebSocket
//!
//! This crate keeps one reconnecting WebSocket open for the current
//! authenticated user and maintains the set of online users pushed by the
//! server. See [`ws`] for the moving parts.

pub mod config;
pub mod error;
pub mod logging;
pub mod stores;
pub mod ws;

pub use config::{ClientConfig, EndpointConfig};
pub use error::{ClientError, ConfigError};
pub use stores::{PresenceRegistry, PresenceSet};
pub use ws::{ManagerHandle, PresenceBinding, PresenceView, WsManager};
