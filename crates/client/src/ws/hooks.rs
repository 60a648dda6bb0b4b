//! Read-only consumer access to the realtime channel.
//!
//! NOTE: Consumers never drive the connection. They observe a
//! [`PresenceView`] that the manager republishes whenever the connection
//! state or the presence set changes.

use tokio::sync::watch;

use super::connection::{ConnectionHandle, ConnectionState};
use crate::stores::PresenceSet;

/// Snapshot of everything a consumer may look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceView {
    /// Present only while the connection is open
    pub connection: Option<ConnectionHandle>,
    pub online_users: PresenceSet,
    pub state: ConnectionState,
    /// Retries ran out for the current identity; presence is stale
    pub retry_exhausted: bool,
}

impl PresenceView {
    pub fn is_online(&self, user_id: &str) -> bool {
        self.online_users.contains(user_id)
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// A socket is opening or a retry is pending.
    pub fn is_connecting(&self) -> bool {
        self.state.is_connecting()
    }
}

/// Cloneable, read-only subscription to the [`PresenceView`].
#[derive(Debug, Clone)]
pub struct PresenceBinding {
    rx: watch::Receiver<PresenceView>,
}

impl PresenceBinding {
    pub(crate) fn new(rx: watch::Receiver<PresenceView>) -> Self {
        Self { rx }
    }

    /// The latest view.
    pub fn current(&self) -> PresenceView {
        self.rx.borrow().clone()
    }

    /// Get the connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.rx.borrow().state
    }

    /// Get a handle for sending frames (None if not connected).
    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.rx.borrow().connection.clone()
    }

    pub fn online_users(&self) -> PresenceSet {
        self.rx.borrow().online_users.clone()
    }

    /// Wait for the next republished view.
    ///
    /// Returns `None` once the manager has shut down.
    pub async fn changed(&mut self) -> Option<PresenceView> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the view satisfies `predicate`.
    ///
    /// Returns `None` if the manager shuts down first.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&PresenceView) -> bool,
    ) -> Option<PresenceView> {
        self.rx
            .wait_for(|view| predicate(view))
            .await
            .ok()
            .map(|view| view.clone())
    }
}
