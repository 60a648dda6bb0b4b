//! Typed dispatch of inbound text frames.

use presence_shared::{InboundMessage, ProtocolError};

use crate::stores::PresenceRegistry;

/// What the router did with a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A presence snapshot replaced the registry.
    PresenceReplaced { online: usize },
    /// The frame was decoded but its type has no handler.
    Unhandled { kind: String },
    /// The frame could not be decoded and was dropped.
    Discarded { reason: &'static str },
}

/// Turns raw frames into registry updates.
///
/// The registry is owned here; the only way it changes is through
/// [`MessageRouter::route`] (or a reset by the supervisor on identity change).
#[derive(Debug, Default)]
pub struct MessageRouter {
    registry: PresenceRegistry,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode and dispatch one frame. Never fails.
    pub fn route(&mut self, raw: &str) -> RouteOutcome {
        let message = match InboundMessage::decode(raw) {
            Ok(message) => message,
            Err(err) => {
                match &err {
                    ProtocolError::MissingType => {
                        crate::log_warn!(frame = raw, "unstructured message")
                    }
                    _ => crate::log_error!(error = %err, frame = raw, "failed to parse message"),
                }
                return RouteOutcome::Discarded { reason: err.label() };
            }
        };

        match message {
            InboundMessage::OnlineUsers(payload) => {
                self.registry.replace(payload.users);
                let online = self.registry.len();
                crate::log_debug!(online, "presence snapshot applied");
                RouteOutcome::PresenceReplaced { online }
            }
            InboundMessage::Unknown { kind } => {
                crate::log_info!(kind = %kind, "unhandled message type");
                RouteOutcome::Unhandled { kind }
            }
        }
    }

    pub fn registry(&self) -> &PresenceRegistry {
        &self.registry
    }

    pub(crate) fn reset_presence(&mut self) {
        self.registry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_replaces_registry() {
        let mut router = MessageRouter::new();
        let outcome = router.route(r#"{"type":"ONLINE_USERS","users":["u1","u42"]}"#);
        assert_eq!(outcome, RouteOutcome::PresenceReplaced { online: 2 });
        assert!(router.registry().is_online("u42"));

        router.route(r#"{"type":"ONLINE_USERS","users":[]}"#);
        assert!(router.registry().is_empty());
    }

    #[test]
    fn bad_frames_leave_registry_untouched() {
        let mut router = MessageRouter::new();
        router.route(r#"{"type":"ONLINE_USERS","users":["u1"]}"#);
        let before = router.registry().current();
        let revision = router.registry().revision();

        assert_eq!(
            router.route("{not json"),
            RouteOutcome::Discarded { reason: "malformed" }
        );
        assert_eq!(
            router.route(r#"{"noType":1}"#),
            RouteOutcome::Discarded { reason: "unstructured" }
        );
        assert_eq!(
            router.route(r#"{"type":"UNKNOWN"}"#),
            RouteOutcome::Unhandled { kind: "UNKNOWN".into() }
        );
        assert_eq!(
            router.route(r#"{"type":"ONLINE_USERS","users":[1,2]}"#),
            RouteOutcome::Discarded { reason: "invalid_payload" }
        );

        assert_eq!(router.registry().current(), before);
        assert_eq!(router.registry().revision(), revision);
    }
}
