//! Async driver for the connection supervisor.
//!
//! [`WsManager`] is the single actor that owns the supervisor, the current
//! transport and the retry timer. It reacts to identity changes, transport
//! events, retry timers, outbound frames and shutdown one at a time, executes
//! the resulting [`SupervisorAction`]s, and republishes the [`PresenceView`].

use std::pin::Pin;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;

use super::connection::{
    ConnectionHandle, ConnectionState, EventSink, Generation, OutboundFrame, TaggedEvent,
    Transport, TransportHandle,
};
use super::hooks::{PresenceBinding, PresenceView};
use super::supervisor::{ConnectionSupervisor, SupervisorAction, SupervisorEvent};
use crate::config::ClientConfig;

/// Receiving end of the identity provider: the current user id, if any.
pub type IdentityReceiver = watch::Receiver<Option<String>>;

struct ActiveTransport {
    generation: Generation,
    handle: Box<dyn TransportHandle>,
}

struct PendingRetry {
    generation: Generation,
    sleep: Pin<Box<Sleep>>,
}

/// Owner-side handle of a spawned manager.
///
/// Dropping it has the same teardown effect as [`ManagerHandle::shutdown`],
/// without waiting for the task to finish.
pub struct ManagerHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ManagerHandle {
    /// Tear the connection down and wait for the manager to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            crate::log_error!(error = %e, "WsManager task failed");
        }
    }
}

/// Drives one realtime connection for whatever identity is current.
pub struct WsManager<T: Transport> {
    supervisor: ConnectionSupervisor,
    transport: T,
    identity: IdentityReceiver,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    outbound_tx: UnboundedSender<OutboundFrame>,
    outbound_rx: UnboundedReceiver<OutboundFrame>,
    view_tx: watch::Sender<PresenceView>,
    current: Option<ActiveTransport>,
    retry: Option<PendingRetry>,
}

impl<T: Transport> WsManager<T> {
    pub fn new(config: &ClientConfig, transport: T, identity: IdentityReceiver) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = unbounded();
        let (view_tx, _) = watch::channel(PresenceView::default());

        Self {
            supervisor: ConnectionSupervisor::new(config),
            transport,
            identity,
            events_tx,
            events_rx,
            outbound_tx,
            outbound_rx,
            view_tx,
            current: None,
            retry: None,
        }
    }

    /// Start the manager on the current tokio runtime.
    pub fn spawn(
        config: &ClientConfig,
        transport: T,
        identity: IdentityReceiver,
    ) -> (ManagerHandle, PresenceBinding) {
        let manager = Self::new(config, transport, identity);
        let binding = manager.binding();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(manager.run(shutdown_rx));

        (
            ManagerHandle {
                shutdown: shutdown_tx,
                task,
            },
            binding,
        )
    }

    /// A new read-only subscription to the presence view.
    pub fn binding(&self) -> PresenceBinding {
        PresenceBinding::new(self.view_tx.subscribe())
    }

    /// Process events until shutdown is requested (or its sender dropped),
    /// or the identity provider goes away.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        let initial = self.identity.borrow_and_update().clone();
        self.apply(SupervisorEvent::IdentityChanged(initial));

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                changed = self.identity.changed() => match changed {
                    Ok(()) => {
                        let identity = self.identity.borrow_and_update().clone();
                        self.apply(SupervisorEvent::IdentityChanged(identity));
                    }
                    Err(_) => {
                        crate::log_info!("identity provider dropped");
                        self.apply(SupervisorEvent::IdentityChanged(None));
                        break;
                    }
                },
                Some(tagged) = self.events_rx.recv() => {
                    self.apply(SupervisorEvent::Transport(tagged));
                }
                Some(frame) = self.outbound_rx.next() => self.forward(frame),
                generation = retry_elapsed(&mut self.retry) => {
                    self.retry = None;
                    self.apply(SupervisorEvent::RetryElapsed(generation));
                }
            }
        }

        self.apply(SupervisorEvent::Shutdown);
        crate::log_info!("WsManager stopped");
    }

    fn apply(&mut self, event: SupervisorEvent) {
        for action in self.supervisor.handle(event) {
            self.execute(action);
        }
        self.publish();
    }

    fn execute(&mut self, action: SupervisorAction) {
        match action {
            SupervisorAction::OpenTransport { generation, url } => {
                let sink = EventSink::new(generation, self.events_tx.clone());
                let handle = self.transport.open(&url, sink);
                self.current = Some(ActiveTransport { generation, handle });
            }
            SupervisorAction::CloseTransport {
                generation,
                code,
                reason,
            } => match self.current.as_mut() {
                Some(active) if active.generation == generation => {
                    active.handle.close(code, &reason);
                }
                _ => crate::log_debug!(%generation, "no transport to close"),
            },
            SupervisorAction::ScheduleRetry { generation, delay } => {
                self.retry = Some(PendingRetry {
                    generation,
                    sleep: Box::pin(tokio::time::sleep(delay)),
                });
            }
            SupervisorAction::CancelRetry { generation } => {
                if self
                    .retry
                    .as_ref()
                    .is_some_and(|pending| pending.generation == generation)
                {
                    self.retry = None;
                }
            }
        }
    }

    fn forward(&mut self, frame: OutboundFrame) {
        let live = frame.generation == self.supervisor.generation()
            && self.supervisor.state().is_connected();
        let active = self
            .current
            .as_mut()
            .filter(|active| live && active.generation == frame.generation);

        match active {
            Some(active) => {
                if let Err(e) = active.handle.send(frame.text) {
                    crate::log_warn!(generation = %frame.generation, error = %e, "outbound frame dropped");
                }
            }
            None => {
                crate::log_debug!(generation = %frame.generation, "dropping frame for stale connection");
            }
        }
    }

    fn view(&self) -> PresenceView {
        let state = self.supervisor.state();
        let connection = match (state, self.supervisor.current_url()) {
            (ConnectionState::Open, Some(url)) => Some(ConnectionHandle::new(
                self.supervisor.generation(),
                url.clone(),
                self.outbound_tx.clone(),
            )),
            _ => None,
        };

        PresenceView {
            connection,
            online_users: self.supervisor.online_users(),
            state,
            retry_exhausted: self.supervisor.retry_exhausted(),
        }
    }

    fn publish(&self) {
        let view = self.view();
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}

async fn retry_elapsed(retry: &mut Option<PendingRetry>) -> Generation {
    match retry {
        Some(pending) => {
            pending.sleep.as_mut().await;
            pending.generation
        }
        None => std::future::pending().await,
    }
}
