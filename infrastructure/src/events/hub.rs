//! Shared event stream connection with per-coordination-id membership.
//!
//! [`EventHub`] owns at most one physical connection per process. Each
//! subscribed coordination id gets its own channel; a background task reads
//! inbound frames and routes them by the payload's coordination id.
//!
//! # Reconnect
//!
//! When the connection drops, the background task reconnects through the
//! configured [`RetryPolicy`] and resends `join` for every registered id.
//! The link lock is only taken to swap the link state, never across a
//! connect or a backoff sleep:
//!
//! - `unsubscribe` during a reconnect drops the route at once; the id is
//!   simply left out of the rejoin.
//! - `subscribe` during a reconnect registers the route and defers its
//!   `join` to the rejoin, so each id is joined exactly once per connection.
//!
//! If every attempt fails, all streams are closed and the hub waits for the
//! next `subscribe` to try again.

use super::connector::{Connection, Connector};
use super::protocol::{ControlFrame, FrameKind, classify_frame, decode_event};
use async_trait::async_trait;
use conclave_application::{EventError, EventStream, EventSubscriber, RetryPolicy};
use conclave_domain::util::truncate_str;
use conclave_domain::{CoordinationId, WorkflowEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockWriteGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

type Routes = HashMap<CoordinationId, mpsc::UnboundedSender<WorkflowEvent>>;

enum LinkState {
    /// Never connected, or shut down
    Down,
    Up(mpsc::UnboundedSender<String>),
    /// Connection dropped, the reader is retrying
    Reconnecting,
    /// Reconnect exhausted its retries
    Lost,
}

/// Lock order: `link` before `routes`.
struct HubInner {
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    routes: RwLock<Routes>,
    link: Mutex<LinkState>,
    /// Serializes first-time connects started by `subscribe`
    connecting: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

/// [`EventSubscriber`] over one shared connection.
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    pub fn new(connector: Arc<dyn Connector>, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(HubInner {
                connector,
                retry,
                routes: RwLock::new(HashMap::new()),
                link: Mutex::new(LinkState::Down),
                connecting: tokio::sync::Mutex::new(()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Coordination ids with a live subscription, sorted.
    pub fn members(&self) -> Vec<CoordinationId> {
        self.inner.member_ids()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.inner.link(), LinkState::Up(_))
    }

    /// Stop the background task and close every stream.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        let mut link = self.inner.link();
        *link = LinkState::Down;
        self.inner.clear_routes();
        info!("Event hub shut down");
    }
}

impl Drop for EventHub {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl HubInner {
    fn link(&self) -> MutexGuard<'_, LinkState> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn routes_mut(&self) -> RwLockWriteGuard<'_, Routes> {
        self.routes.write().unwrap_or_else(|e| e.into_inner())
    }

    fn member_ids(&self) -> Vec<CoordinationId> {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<CoordinationId> = routes.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn clear_routes(&self) -> usize {
        let mut routes = self.routes_mut();
        let closed = routes.len();
        routes.clear();
        closed
    }

    /// Open the shared connection unless one is up or being re-established.
    async fn connect_if_needed(self: &Arc<Self>) -> Result<(), EventError> {
        let _connecting = self.connecting.lock().await;
        let was_lost = {
            let link = self.link();
            match &*link {
                LinkState::Up(_) | LinkState::Reconnecting => return Ok(()),
                LinkState::Down => false,
                LinkState::Lost => true,
            }
        };

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Err(EventError::Closed),
            result = self.retry.execute(|| self.connector.connect()) => result,
        };

        match result {
            Ok(Connection { outbound, inbound }) => {
                {
                    let mut link = self.link();
                    if self.cancel.is_cancelled() {
                        return Err(EventError::Closed);
                    }
                    *link = LinkState::Up(outbound);
                }
                info!("Event stream connected");
                tokio::spawn(Arc::clone(self).run(inbound));
                Ok(())
            }
            Err(e) if was_lost => {
                warn!(error = %e, "Event stream still unreachable");
                Err(EventError::Disconnected)
            }
            Err(e) => Err(e.into_inner()),
        }
    }

    /// Background reader: routes frames until cancelled or reconnect fails.
    async fn run(self: Arc<Self>, mut inbound: mpsc::UnboundedReceiver<String>) {
        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Event hub reader cancelled");
                    return;
                }
                frame = inbound.recv() => frame,
            };

            match frame {
                Some(text) => self.route(&text),
                None => {
                    warn!("Event stream connection lost, reconnecting");
                    match self.reconnect().await {
                        Some(next) => inbound = next,
                        None => return,
                    }
                }
            }
        }
    }

    async fn reconnect(&self) -> Option<mpsc::UnboundedReceiver<String>> {
        {
            let mut link = self.link();
            if self.cancel.is_cancelled() {
                return None;
            }
            *link = LinkState::Reconnecting;
        }

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            result = self.retry.execute(|| self.connector.connect()) => result,
        };

        let mut link = self.link();
        if self.cancel.is_cancelled() {
            return None;
        }
        match result {
            Ok(Connection { outbound, inbound }) => {
                let members = self.member_ids();
                for id in &members {
                    send_control(&outbound, ControlFrame::join(id));
                }
                info!(rejoined = members.len(), "Event stream reconnected");
                *link = LinkState::Up(outbound);
                Some(inbound)
            }
            Err(e) => {
                let closed = self.clear_routes();
                warn!(error = %e, closed, "Event stream reconnect failed, closing streams");
                *link = LinkState::Lost;
                None
            }
        }
    }

    fn route(&self, text: &str) {
        trace!("Event stream received: {}", text);

        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    "Event stream: failed to parse frame: {} - {}",
                    e,
                    truncate_str(text, 200)
                );
                return;
            }
        };

        match classify_frame(&value) {
            FrameKind::Event => {}
            FrameKind::Unsupported(kind) => {
                debug!("Event stream: ignoring frame kind={}", kind);
                return;
            }
            FrameKind::Malformed => {
                warn!(
                    "Event stream: frame without kind tag - {}",
                    truncate_str(text, 200)
                );
                return;
            }
        }

        let event = match decode_event(value) {
            Ok(event) => event,
            Err(e) => {
                warn!("Event stream: failed to decode event: {}", e);
                return;
            }
        };

        let coordination_id = event.coordination_id().clone();
        let delivered = {
            let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
            routes
                .get(&coordination_id)
                .map(|tx| tx.send(event).is_ok())
        };
        match delivered {
            Some(true) => {}
            Some(false) => debug!(
                "Event stream: subscriber for coordination_id={} dropped its stream",
                coordination_id
            ),
            None => debug!(
                "Event stream: no route for coordination_id={}",
                coordination_id
            ),
        }
    }
}

fn send_control(outbound: &mpsc::UnboundedSender<String>, frame: ControlFrame) -> bool {
    let sent = outbound.send(frame.to_text()).is_ok();
    if !sent {
        debug!(
            "Event stream: dropped {:?} for {}, connection closing",
            frame.op, frame.coordination_id
        );
    }
    sent
}

#[async_trait]
impl EventSubscriber for EventHub {
    async fn subscribe(&self, coordination_id: &CoordinationId) -> Result<EventStream, EventError> {
        if self.inner.cancel.is_cancelled() {
            return Err(EventError::Closed);
        }
        self.inner.connect_if_needed().await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (outbound, replaced) = {
            let link = self.inner.link();
            let outbound = match &*link {
                LinkState::Up(outbound) => Some(outbound.clone()),
                LinkState::Reconnecting => None,
                LinkState::Down => return Err(EventError::Closed),
                LinkState::Lost => return Err(EventError::Disconnected),
            };
            let replaced = self
                .inner
                .routes_mut()
                .insert(coordination_id.clone(), tx)
                .is_some();
            (outbound, replaced)
        };
        if replaced {
            debug!("Replaced subscription for {}", coordination_id);
        }

        match outbound {
            // A failed send means the reader is about to reconnect and rejoin
            Some(outbound) => {
                send_control(&outbound, ControlFrame::join(coordination_id));
            }
            None => debug!("Join for {} deferred until reconnect", coordination_id),
        }
        info!("Subscribed to coordination {}", coordination_id);
        Ok(EventStream::new(coordination_id.clone(), rx))
    }

    async fn unsubscribe(&self, coordination_id: &CoordinationId) -> Result<(), EventError> {
        let outbound = {
            let link = self.inner.link();
            if self.inner.routes_mut().remove(coordination_id).is_none() {
                return Ok(());
            }
            match &*link {
                LinkState::Up(outbound) => Some(outbound.clone()),
                _ => None,
            }
        };

        if let Some(outbound) = outbound {
            send_control(&outbound, ControlFrame::leave(coordination_id));
        }
        info!("Unsubscribed from coordination {}", coordination_id);
        Ok(())
    }
}
