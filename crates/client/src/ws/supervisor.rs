//! Connection supervisor: the lifecycle state machine of the realtime channel.
//!
//! The supervisor is sans-IO. [`ConnectionSupervisor::handle`] is the single
//! transition function; it takes an event and returns the actions the driver
//! ([`crate::ws::WsManager`]) must perform: open or close a transport, arm or
//! disarm the retry timer.
//!
//! ```text
//!            identity            open
//!   ┌──────┐ ───────> ┌────────────┐ ───────> ┌──────┐
//!   │ Idle │          │ Connecting │          │ Open │
//!   └──────┘          └────────────┘ <─────── └──────┘
//!                       │  ▲    │   close/retry   │
//!                       │  │    │                 │ error
//!           exhausted / │  │    │ error           ▼
//!           identity    │  │    └──────────> ┌─────────┐
//!           lost        │  └──── close ───── │ Closing │
//!                       ▼                    └─────────┘
//!                   ┌────────┐
//!                   │ Closed │  (terminal for this identity)
//!                   └────────┘
//! ```
//!
//! Every transport attempt gets a fresh [`Generation`]. Transport events and
//! retry timers carry the generation they were created for, and anything
//! that does not match the current generation is dropped. Teardown also
//! advances the generation, so nothing from before it can act afterwards.

use std::time::Duration;

use presence_shared::{is_normal_closure, NORMAL_CLOSURE};
use url::Url;

use super::backoff::{BackoffPolicy, ReconnectState};
use super::connection::{ConnectionState, Generation, TaggedEvent, TransportEvent};
use super::router::{MessageRouter, RouteOutcome};
use crate::config::{ClientConfig, EndpointConfig};
use crate::stores::{PresenceRegistry, PresenceSet};

/// Reason sent with the close frame on intentional teardown.
pub const TEARDOWN_REASON: &str = "client teardown";

/// Reason sent when force-closing after a transport error.
pub const ERROR_CLOSE_REASON: &str = "transport error";

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// The identity provider reported a (possibly absent) user id.
    IdentityChanged(Option<String>),
    /// Something happened on a transport.
    Transport(TaggedEvent),
    /// The retry timer armed for this generation fired.
    RetryElapsed(Generation),
    /// The owner is going away.
    Shutdown,
}

/// Work the driver must carry out, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorAction {
    OpenTransport {
        generation: Generation,
        url: Url,
    },
    CloseTransport {
        generation: Generation,
        code: u16,
        reason: String,
    },
    ScheduleRetry {
        generation: Generation,
        delay: Duration,
    },
    CancelRetry {
        generation: Generation,
    },
}

#[derive(Debug)]
pub struct ConnectionSupervisor {
    endpoint: EndpointConfig,
    policy: BackoffPolicy,
    reconnect: ReconnectState,
    state: ConnectionState,
    identity: Option<String>,
    generation: Generation,
    /// URL of the current attempt
    url: Option<Url>,
    /// A transport exists for `generation` and has not reported `closed`
    transport_live: bool,
    /// A retry timer is armed for `generation`
    retry_pending: bool,
    retry_exhausted: bool,
    router: MessageRouter,
}

impl ConnectionSupervisor {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            policy: config.backoff,
            reconnect: config.backoff.reset(),
            state: ConnectionState::Idle,
            identity: None,
            generation: Generation::default(),
            url: None,
            transport_live: false,
            retry_pending: false,
            retry_exhausted: false,
            router: MessageRouter::new(),
        }
    }

    /// Apply one event and return the actions it requires.
    pub fn handle(&mut self, event: SupervisorEvent) -> Vec<SupervisorAction> {
        match event {
            SupervisorEvent::IdentityChanged(identity) => {
                match identity.filter(|id| !id.is_empty()) {
                    Some(identity) => self.connect(&identity),
                    None => self.identity_lost(),
                }
            }
            SupervisorEvent::Transport(tagged) => self.on_transport(tagged),
            SupervisorEvent::RetryElapsed(generation) => self.on_retry(generation),
            SupervisorEvent::Shutdown => self.teardown(),
        }
    }

    /// Ensure a connection exists for `identity`.
    ///
    /// No-op while a live attempt for the same identity exists. Otherwise any
    /// previous attempt is torn down before the new transport is opened.
    pub fn connect(&mut self, identity: &str) -> Vec<SupervisorAction> {
        let same_identity = self.identity.as_deref() == Some(identity);
        if same_identity && self.state.is_live() {
            crate::log_debug!(identity, state = ?self.state, "connect: already live");
            return Vec::new();
        }

        let mut actions = self.teardown();
        if !same_identity {
            self.router.reset_presence();
        }
        self.identity = Some(identity.to_string());
        self.retry_exhausted = false;
        self.state = ConnectionState::Idle;
        self.open_transport(&mut actions);
        actions
    }

    /// Close the current transport and cancel any pending retry.
    ///
    /// Idempotent: a second call finds nothing live and returns no actions.
    pub fn teardown(&mut self) -> Vec<SupervisorAction> {
        let mut actions = Vec::new();

        if self.retry_pending {
            self.retry_pending = false;
            actions.push(SupervisorAction::CancelRetry {
                generation: self.generation,
            });
        }
        if self.transport_live {
            self.transport_live = false;
            actions.push(SupervisorAction::CloseTransport {
                generation: self.generation,
                code: NORMAL_CLOSURE,
                reason: TEARDOWN_REASON.to_string(),
            });
        }
        if !actions.is_empty() {
            // Anything still in flight for the old generation is now stale
            self.generation = self.generation.next();
        }
        if self.state.is_live() {
            crate::log_info!(generation = %self.generation, "connection torn down");
            self.state = ConnectionState::Closed;
        }

        self.url = None;
        self.reconnect = self.policy.reset();
        actions
    }

    fn identity_lost(&mut self) -> Vec<SupervisorAction> {
        let actions = self.teardown();
        if self.identity.take().is_some() {
            crate::log_info!("identity cleared");
            self.router.reset_presence();
            self.retry_exhausted = false;
        }
        actions
    }

    fn open_transport(&mut self, actions: &mut Vec<SupervisorAction>) {
        let Some(identity) = self.identity.as_deref() else {
            return;
        };

        match self.endpoint.url_for(identity) {
            Ok(url) => {
                self.generation = self.generation.next();
                self.transport_live = true;
                self.state = ConnectionState::Connecting;
                self.url = Some(url.clone());
                crate::log_info!(
                    generation = %self.generation,
                    url = %url,
                    attempt = self.reconnect.attempts,
                    "opening transport"
                );
                actions.push(SupervisorAction::OpenTransport {
                    generation: self.generation,
                    url,
                });
            }
            Err(e) => {
                crate::log_error!(error = %e, "cannot build realtime URL");
                self.state = ConnectionState::Closed;
            }
        }
    }

    fn on_transport(&mut self, tagged: TaggedEvent) -> Vec<SupervisorAction> {
        let TaggedEvent { generation, event } = tagged;
        if generation != self.generation || !self.transport_live {
            crate::log_debug!(
                %generation,
                current = %self.generation,
                ?event,
                "ignoring event from stale transport"
            );
            return Vec::new();
        }

        let mut actions = Vec::new();
        match event {
            TransportEvent::Opened => {
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Open;
                    self.reconnect = self.policy.reset();
                    crate::log_info!(%generation, "connection open");
                } else {
                    crate::log_debug!(%generation, state = ?self.state, "ignoring open");
                }
            }
            TransportEvent::Message(text) => {
                if self.state == ConnectionState::Open {
                    if let RouteOutcome::PresenceReplaced { online } = self.router.route(&text) {
                        crate::log_debug!(%generation, online, "presence updated");
                    }
                } else {
                    crate::log_debug!(%generation, state = ?self.state, "ignoring message while not open");
                }
            }
            TransportEvent::Error(error) => {
                if self.state == ConnectionState::Closing {
                    crate::log_debug!(%generation, error = %error, "error while already closing");
                } else {
                    crate::log_warn!(%generation, error = %error, "transport error, closing");
                    self.state = ConnectionState::Closing;
                    actions.push(SupervisorAction::CloseTransport {
                        generation,
                        code: NORMAL_CLOSURE,
                        reason: ERROR_CLOSE_REASON.to_string(),
                    });
                }
            }
            TransportEvent::Closed { code, reason } => {
                self.transport_live = false;
                let forced = self.state == ConnectionState::Closing;
                crate::log_info!(%generation, code, reason = %reason, "connection closed");
                if !forced && is_normal_closure(code) {
                    self.state = ConnectionState::Closed;
                    self.url = None;
                } else {
                    self.schedule_retry(&mut actions);
                }
            }
        }
        actions
    }

    fn schedule_retry(&mut self, actions: &mut Vec<SupervisorAction>) {
        if self.policy.is_exhausted(&self.reconnect) {
            crate::log_warn!(
                attempts = self.reconnect.attempts,
                max_attempts = self.policy.max_attempts,
                "max reconnect attempts exceeded, giving up"
            );
            self.state = ConnectionState::Closed;
            self.retry_exhausted = true;
            self.url = None;
            return;
        }

        let delay = self.reconnect.delay();
        self.reconnect = self.policy.next_delay(self.reconnect);
        self.retry_pending = true;
        self.state = ConnectionState::Connecting;
        crate::log_info!(
            generation = %self.generation,
            delay_ms = delay.as_millis() as u64,
            attempt = self.reconnect.attempts,
            "reconnect scheduled"
        );
        actions.push(SupervisorAction::ScheduleRetry {
            generation: self.generation,
            delay,
        });
    }

    fn on_retry(&mut self, generation: Generation) -> Vec<SupervisorAction> {
        if generation != self.generation || !self.retry_pending {
            crate::log_debug!(%generation, current = %self.generation, "ignoring stale retry timer");
            return Vec::new();
        }
        self.retry_pending = false;
        let mut actions = Vec::new();
        self.open_transport(&mut actions);
        actions
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn current_url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn reconnect_state(&self) -> ReconnectState {
        self.reconnect
    }

    pub fn retry_exhausted(&self) -> bool {
        self.retry_exhausted
    }

    pub fn registry(&self) -> &PresenceRegistry {
        self.router.registry()
    }

    pub fn online_users(&self) -> PresenceSet {
        self.router.registry().current()
    }
}
