//! WebSocket module for the realtime presence channel.
//!
//! This module provides:
//! - A sans-IO connection supervisor with generation-guarded events
//! - Exponential backoff reconnects
//! - Typed dispatch of inbound frames into the presence registry
//! - A read-only binding for consumers
//!
//! # Architecture
//!
//! ```text
//!   Identity provider ──(watch)──┐
//!                                ▼
//!   ┌──────────────────────────────────────────────────┐
//!   │                    WsManager                     │
//!   │   (single task: events in, actions out)          │
//!   │                                                  │
//!   │   ConnectionSupervisor ── BackoffPolicy          │
//!   │          │                                       │
//!   │          └── MessageRouter ── PresenceRegistry   │
//!   └──────────────────────────────────────────────────┘
//!          ▲ tagged events              │ PresenceView (watch)
//!          │                            ▼
//!   ┌────────────┐              ┌────────────────┐
//!   │ Transport  │              │ PresenceBinding│ ── consumers
//!   │ (socket)   │              └────────────────┘
//!   └────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let (identity_tx, identity_rx) = watch::channel(Some("u42".to_string()));
//! let (manager, mut binding) =
//!     WsManager::spawn(&ClientConfig::from_env()?, TungsteniteTransport::new(), identity_rx);
//!
//! while let Some(view) = binding.changed().await {
//!     println!("{} online", view.online_users.len());
//! }
//! ```

mod backoff;
mod connection;
mod hooks;
mod manager;
mod router;
mod supervisor;

pub use backoff::{BackoffPolicy, ReconnectState};
pub use connection::{
    ConnectionHandle, ConnectionState, EventSink, Generation, OutboundFrame, TaggedEvent,
    Transport, TransportEvent, TransportHandle, TungsteniteTransport,
};
pub use hooks::{PresenceBinding, PresenceView};
pub use manager::{IdentityReceiver, ManagerHandle, WsManager};
pub use router::{MessageRouter, RouteOutcome};
pub use supervisor::{
    ConnectionSupervisor, SupervisorAction, SupervisorEvent, ERROR_CLOSE_REASON, TEARDOWN_REASON,
};
