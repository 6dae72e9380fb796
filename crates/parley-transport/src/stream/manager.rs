//! Single shared streaming connection with credential-aware reconnect.
//!
//! Every active subscription is kept as a descriptor in a registry, so a
//! fresh connection can replay them all. Each connection gets a generation
//! number; frames from a connection that is no longer current are dropped.

use futures::Stream;
use parley_types::{ChannelEvent, Operation, RetryPolicy};
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use super::connector::{ConnectionParams, Inbound, StreamConnector, StreamHandle};
use super::ws::WsConnector;
use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::graphql::GraphQlRequest;
use crate::link::Channel;
use crate::session::{Session, TokenChange};

/// Item yielded by a [`Subscription`]: a pushed payload or a channel error
pub type SubscriptionItem = Result<Value>;

/// Upper bound for a detached connection teardown
const DISPOSE_TIMEOUT: Duration = Duration::from_secs(5);

struct Registered {
    name: String,
    request: GraphQlRequest,
    sender: mpsc::UnboundedSender<SubscriptionItem>,
}

struct Connection {
    generation: u64,
    handle: Box<dyn StreamHandle>,
    pump: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    generation: u64,
    connection: Option<Connection>,
    registry: HashMap<String, Registered>,
    retry: Option<JoinHandle<()>>,
    /// Consecutive reconnects without a delivered frame
    streak: u32,
    watcher: Option<JoinHandle<()>>,
}

struct Inner {
    connector: Arc<dyn StreamConnector>,
    session: Arc<dyn Session>,
    policy: RetryPolicy,
    state: Mutex<State>,
    next_id: AtomicU64,
    events: broadcast::Sender<ChannelEvent>,
}

/// Streaming channel shared by every subscription of a client.
///
/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct StreamingChannel {
    inner: Arc<Inner>,
}

impl StreamingChannel {
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        session: Arc<dyn Session>,
        policy: RetryPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                connector,
                session,
                policy,
                state: Mutex::new(State::default()),
                next_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    pub fn from_config(config: &TransportConfig, session: Arc<dyn Session>) -> Self {
        Self::new(
            Arc::new(WsConnector::from_config(config)),
            session,
            config.retry.clone(),
        )
    }

    /// Start a subscription; opens the connection lazily on first use
    pub async fn subscribe(&self, operation: &Operation) -> Result<Subscription> {
        if !operation.is_subscription() {
            return Err(TransportError::WrongChannel {
                kind: operation.kind,
                channel: Channel::Streaming,
            });
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let request = GraphQlRequest::from(operation);
        let (sender, receiver) = mpsc::unbounded_channel();

        let mut state = self.inner.state.lock().await;
        self.inner.ensure_watcher(&mut state);
        state.registry.insert(
            id.clone(),
            Registered {
                name: operation.name.clone(),
                request: request.clone(),
                sender,
            },
        );

        if let Some(connection) = &state.connection {
            if let Err(e) = connection.handle.start(&id, &request).await {
                tracing::warn!(id = %id, operation = %operation.name, error = %e, "Failed to start subscription");
            }
        } else if !state.retry.as_ref().is_some_and(|retry| !retry.is_finished()) {
            state.streak = 0;
            self.inner.connect_or_retry(&mut state).await;
        }
        drop(state);

        tracing::debug!(id = %id, operation = %operation.name, "Subscription registered");

        Ok(Subscription {
            id,
            receiver,
            channel: Arc::downgrade(&self.inner),
        })
    }

    /// Tear down the current connection and open a new one with a freshly
    /// resolved token, replaying every active subscription.
    ///
    /// Runs automatically on every credential change.
    pub async fn reconnect(&self) {
        self.inner.reconnect().await;
    }

    /// Dispose the connection and end every subscription
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(retry) = state.retry.take() {
            retry.abort();
        }
        if let Some(watcher) = state.watcher.take() {
            watcher.abort();
        }
        let teardown = self.inner.dispose_locked(&mut state);
        state.registry.clear();
        drop(state);

        if let Some(teardown) = teardown {
            let _ = teardown.await;
        }
    }

    pub fn events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.inner.events.subscribe()
    }

    /// Generation of the most recent connection attempt
    pub async fn generation(&self) -> u64 {
        self.inner.state.lock().await.generation
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.state.lock().await.connection.is_some()
    }

    /// Operation names of the registered subscriptions, sorted
    pub async fn active_subscriptions(&self) -> Vec<String> {
        let state = self.inner.state.lock().await;
        let mut names: Vec<String> = state.registry.values().map(|r| r.name.clone()).collect();
        names.sort();
        names
    }
}

impl Inner {
    fn emit(&self, event: ChannelEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn ensure_watcher(self: &Arc<Self>, state: &mut State) {
        if state.watcher.as_ref().is_some_and(|w| !w.is_finished()) {
            return;
        }
        let changes = self.session.token_changes();
        state.watcher = Some(tokio::spawn(watch_credentials(Arc::downgrade(self), changes)));
    }

    async fn connect_locked(self: &Arc<Self>, state: &mut State) -> Result<()> {
        state.generation += 1;
        let generation = state.generation;

        let token = self.session.access_token().await;
        let (inbound, frames) = mpsc::unbounded_channel();

        let handle = match self.connector.open(ConnectionParams::new(token), inbound).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(generation, error = %e, "Failed to open streaming connection");
                self.emit(ChannelEvent::ConnectFailed {
                    generation,
                    message: e.to_string(),
                });
                for registered in state.registry.values() {
                    let _ = registered
                        .sender
                        .send(Err(TransportError::ConnectFailed(e.to_string())));
                }
                return Err(e);
            }
        };

        for (id, registered) in &state.registry {
            if let Err(e) = handle.start(id, &registered.request).await {
                tracing::warn!(id = %id, operation = %registered.name, error = %e, "Failed to replay subscription");
            }
        }

        let pump = tokio::spawn(pump(Arc::downgrade(self), generation, frames));
        state.connection = Some(Connection {
            generation,
            handle,
            pump,
        });

        tracing::info!(generation, subscriptions = state.registry.len(), "Streaming channel connected");
        self.emit(ChannelEvent::Connected {
            generation,
            subscriptions: state.registry.len(),
        });
        Ok(())
    }

    async fn connect_or_retry(self: &Arc<Self>, state: &mut State) {
        if self.connect_locked(state).await.is_err() {
            self.schedule_retry(state);
        }
    }

    /// Backoff follows the streak, so a server that accepts and then drops
    /// the connection still runs out of attempts
    fn schedule_retry(self: &Arc<Self>, state: &mut State) {
        if state.registry.is_empty() {
            return;
        }
        let attempt = state.streak;
        if !self.policy.allows(attempt) {
            tracing::warn!(attempt, "Reconnect attempts exhausted, streaming channel stays offline");
            return;
        }
        state.streak += 1;

        let delay = self.policy.delay_for(attempt);
        self.emit(ChannelEvent::Reconnecting {
            attempt: attempt + 1,
            delay_ms: delay.as_millis() as u64,
        });

        let expected = state.generation;
        let weak = Arc::downgrade(self);
        state.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(inner) = weak.upgrade() else { return };
            let mut state = inner.state.lock().await;
            if state.generation != expected || state.connection.is_some() {
                return;
            }
            state.retry = None;
            if state.registry.is_empty() {
                return;
            }
            if inner.connect_locked(&mut state).await.is_err() {
                inner.schedule_retry(&mut state);
            }
        }));
    }

    /// Detach the current connection and tear it down in the background.
    ///
    /// The connection stops delivering right away; the returned task only
    /// tracks the socket teardown.
    fn dispose_locked(&self, state: &mut State) -> Option<JoinHandle<()>> {
        let Connection {
            generation,
            handle,
            pump,
        } = state.connection.take()?;

        pump.abort();
        self.emit(ChannelEvent::Disposed { generation });

        Some(tokio::spawn(async move {
            match tokio::time::timeout(DISPOSE_TIMEOUT, handle.dispose()).await {
                Ok(Ok(())) => tracing::debug!(generation, "Streaming connection disposed"),
                Ok(Err(e)) => {
                    tracing::error!(generation, error = %e, "Failed to dispose streaming connection")
                }
                Err(_) => tracing::error!(
                    generation,
                    timeout_ms = DISPOSE_TIMEOUT.as_millis() as u64,
                    "Streaming connection teardown timed out"
                ),
            }
        }))
    }

    async fn reconnect(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        if let Some(retry) = state.retry.take() {
            retry.abort();
        }

        // Teardown runs detached and never holds up the replacement
        self.dispose_locked(&mut state);
        state.streak = 0;

        if state.registry.is_empty() {
            tracing::debug!("No active subscriptions, staying disconnected");
            return;
        }
        self.connect_or_retry(&mut state).await;
    }

    async fn unsubscribe(&self, id: &str) {
        let mut state = self.state.lock().await;
        let Some(registered) = state.registry.remove(id) else {
            return;
        };

        if let Some(connection) = &state.connection {
            if let Err(e) = connection.handle.stop(id).await {
                tracing::debug!(id = %id, error = %e, "Failed to stop subscription");
            }
        }
        tracing::debug!(id = %id, operation = %registered.name, "Subscription removed");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for task in [state.watcher.take(), state.retry.take()].into_iter().flatten() {
            task.abort();
        }
        if let Some(connection) = state.connection.take() {
            connection.pump.abort();
        }
    }
}

async fn watch_credentials(inner: Weak<Inner>, mut changes: broadcast::Receiver<TokenChange>) {
    loop {
        let change = match changes.recv().await {
            Ok(change) => change,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Missed credential notifications");
                TokenChange::Refreshed
            }
            Err(RecvError::Closed) => break,
        };

        let Some(inner) = inner.upgrade() else { break };
        tracing::info!(change = ?change, "Credentials changed, reconnecting streaming channel");
        inner.reconnect().await;
    }
}

async fn pump(inner: Weak<Inner>, generation: u64, mut frames: mpsc::UnboundedReceiver<Inbound>) {
    while let Some(frame) = frames.recv().await {
        let Some(inner) = inner.upgrade() else { break };
        let mut state = inner.state.lock().await;

        let current = state
            .connection
            .as_ref()
            .is_some_and(|c| c.generation == generation);
        if !current {
            tracing::debug!(generation, "Dropping frame from stale connection");
            break;
        }

        match frame {
            Inbound::Next { id, payload } => {
                if let Some(registered) = state.registry.get(&id) {
                    let _ = registered.sender.send(payload.into_result());
                    state.streak = 0;
                }
            }
            Inbound::Error { id, errors } => {
                if let Some(registered) = state.registry.remove(&id) {
                    let _ = registered.sender.send(Err(TransportError::GraphQl(errors)));
                }
            }
            Inbound::Complete { id } => {
                // Dropping the sender ends the subscriber's stream
                state.registry.remove(&id);
            }
            Inbound::Closed { reason } => {
                tracing::warn!(generation, reason = ?reason, "Streaming connection lost");
                state.connection = None;
                for registered in state.registry.values() {
                    let _ = registered.sender.send(Err(TransportError::ConnectionClosed));
                }
                inner.schedule_retry(&mut state);
                break;
            }
        }
    }
}

/// Stream of payloads for one registered subscription.
///
/// Dropping it unsubscribes.
pub struct Subscription {
    id: String,
    receiver: mpsc::UnboundedReceiver<SubscriptionItem>,
    channel: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Stream for Subscription {
    type Item = SubscriptionItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.channel.upgrade() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let id = std::mem::take(&mut self.id);
        runtime.spawn(async move {
            inner.unsubscribe(&id).await;
        });
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
