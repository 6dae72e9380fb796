//! Push-triggers-pull live feeds.
//!
//! A subscription push only signals that something relevant changed; the
//! bound queries are then re-executed network-only and their results written
//! to the cache. The push payload itself never reaches the cache.

use futures::StreamExt;
use parley_transport::Subscription;
use parley_types::{FeedEvent, QueryKey, SubscriptionKey};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::SyncClient;
use crate::error::Result;

/// Binding table: subscription key → queries to re-run on every push
#[derive(Debug, Clone, Default)]
pub struct FeedBindings {
    overrides: HashMap<SubscriptionKey, Vec<QueryKey>>,
    extras: HashMap<SubscriptionKey, Vec<QueryKey>>,
}

impl FeedBindings {
    /// Only the standard bindings
    pub fn standard() -> Self {
        Self::default()
    }

    /// Replace the queries bound to `key`
    pub fn bind(mut self, key: SubscriptionKey, queries: Vec<QueryKey>) -> Self {
        self.overrides.insert(key, queries);
        self
    }

    /// Refresh `queries` in addition to whatever `key` is already bound to
    pub fn also_refresh(mut self, key: SubscriptionKey, queries: Vec<QueryKey>) -> Self {
        self.extras.entry(key).or_default().extend(queries);
        self
    }

    pub fn queries_for(&self, key: &SubscriptionKey) -> Vec<QueryKey> {
        let mut queries = match self.overrides.get(key) {
            Some(queries) => queries.clone(),
            None => standard_queries(key),
        };
        if let Some(extras) = self.extras.get(key) {
            for query in extras {
                if !queries.contains(query) {
                    queries.push(query.clone());
                }
            }
        }
        queries
    }
}

fn standard_queries(key: &SubscriptionKey) -> Vec<QueryKey> {
    match key {
        SubscriptionKey::Chats => vec![QueryKey::UserChats],
        SubscriptionKey::Messages { chat_id } => vec![QueryKey::chat_messages(chat_id.clone())],
    }
}

#[derive(Clone)]
pub struct LiveFeedCoordinator {
    client: SyncClient,
    bindings: Arc<FeedBindings>,
}

impl LiveFeedCoordinator {
    pub fn new(client: SyncClient, bindings: FeedBindings) -> Self {
        Self {
            client,
            bindings: Arc::new(bindings),
        }
    }

    pub fn bindings(&self) -> &FeedBindings {
        &self.bindings
    }

    /// Start a feed. `None` (nothing selected) starts nothing: no
    /// connection attempt, no refresh.
    pub async fn watch(&self, key: Option<SubscriptionKey>) -> Result<Option<LiveFeed>> {
        let Some(key) = key else {
            tracing::debug!("No resource selected, feed not started");
            return Ok(None);
        };

        let queries = self.bindings.queries_for(&key);
        let subscription = self.client.subscribe(&key).await?;
        let (events, receiver) = mpsc::unbounded_channel();

        tracing::info!(feed = %key, bound = queries.len(), "Live feed started");

        let task = tokio::spawn(run_feed(
            self.client.clone(),
            key.clone(),
            queries,
            subscription,
            events,
        ));

        Ok(Some(LiveFeed {
            key,
            events: receiver,
            task,
        }))
    }

    /// Refresh the queries bound to `key` once, outside of any push
    pub async fn refresh(&self, key: &SubscriptionKey) -> Vec<FeedEvent> {
        refresh_bound(&self.client, &self.bindings.queries_for(key)).await
    }
}

async fn refresh_bound(client: &SyncClient, queries: &[QueryKey]) -> Vec<FeedEvent> {
    let mut events = Vec::with_capacity(queries.len());
    for (query, result) in client.refetch_queries(queries).await {
        match result {
            Ok(entities) => events.push(FeedEvent::Refreshed { query, entities }),
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Feed refresh failed");
                events.push(FeedEvent::RefreshFailed {
                    query,
                    message: e.to_string(),
                });
            }
        }
    }
    events
}

async fn run_feed(
    client: SyncClient,
    key: SubscriptionKey,
    queries: Vec<QueryKey>,
    mut subscription: Subscription,
    events: mpsc::UnboundedSender<FeedEvent>,
) {
    while let Some(item) = subscription.next().await {
        match item {
            Ok(_) => {
                tracing::debug!(feed = %key, "Push received, refreshing bound queries");
                let _ = events.send(FeedEvent::Pushed { key: key.clone() });
                for event in refresh_bound(&client, &queries).await {
                    let _ = events.send(event);
                }
            }
            Err(e) => {
                tracing::warn!(feed = %key, error = %e, "Live feed stream error");
                let _ = events.send(FeedEvent::StreamError {
                    message: e.to_string(),
                });
            }
        }
    }
    tracing::debug!(feed = %key, "Live feed ended");
}

/// Running feed; dropping it stops the feed and unsubscribes
pub struct LiveFeed {
    key: SubscriptionKey,
    events: mpsc::UnboundedReceiver<FeedEvent>,
    task: JoinHandle<()>,
}

impl LiveFeed {
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Next thing the feed did; `None` once the subscription has ended
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_bindings() {
        let bindings = FeedBindings::standard();

        assert_eq!(bindings.queries_for(&SubscriptionKey::Chats), vec![QueryKey::UserChats]);
        assert_eq!(
            bindings.queries_for(&SubscriptionKey::messages("c1")),
            vec![QueryKey::chat_messages("c1")]
        );
    }

    #[test]
    fn test_bind_overrides_standard() {
        let bindings = FeedBindings::standard().bind(SubscriptionKey::Chats, vec![]);
        assert!(bindings.queries_for(&SubscriptionKey::Chats).is_empty());
    }

    #[test]
    fn test_also_refresh_extends_without_duplicates() {
        let bindings = FeedBindings::standard().also_refresh(
            SubscriptionKey::messages("c1"),
            vec![QueryKey::UserChats, QueryKey::chat_messages("c1")],
        );

        assert_eq!(
            bindings.queries_for(&SubscriptionKey::messages("c1")),
            vec![QueryKey::chat_messages("c1"), QueryKey::UserChats]
        );
        // Other chats are unaffected
        assert_eq!(
            bindings.queries_for(&SubscriptionKey::messages("c2")),
            vec![QueryKey::chat_messages("c2")]
        );
    }
}
