//! Process-wide normalized cache.
//!
//! Entities are stored once under their `(kind, id)` identity; a materialized
//! query only holds the ordered list of entity keys it resolved to. Two queries
//! that reference the same message therefore always read the same snapshot.
//!
//! The cache is written only with operation results (query refreshes and
//! mutation payloads). Views read from it and listen for [`CacheEvent`]s.
//!
//! Query writes are versioned: a refresh takes a version with
//! [`NormalizedCache::next_version`] before it goes to the network, and a
//! result older than the one already written for that query is dropped.

use parley_types::{Chat, Message, QueryKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};

use crate::record::{EntityKey, Record};

/// Change notification broadcast after a write that changed something
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    QueryUpdated { key: QueryKey },
    EntityUpdated { key: EntityKey },
}

#[derive(Default)]
struct CacheState {
    entities: HashMap<EntityKey, Record>,
    queries: HashMap<QueryKey, Vec<EntityKey>>,
    /// Version of the result each query currently holds
    versions: HashMap<QueryKey, u64>,
}

impl CacheState {
    /// Upsert one entity; true when the stored snapshot changed
    fn upsert(&mut self, record: Record) -> bool {
        let key = record.key();
        match self.entities.get(&key) {
            Some(existing) if *existing == record => false,
            _ => {
                self.entities.insert(key, record);
                true
            }
        }
    }

    fn resolve(&self, refs: &[EntityKey]) -> Vec<Record> {
        refs.iter()
            .filter_map(|key| self.entities.get(key).cloned())
            .collect()
    }
}

pub struct NormalizedCache {
    state: RwLock<CacheState>,
    next_version: AtomicU64,
    events: broadcast::Sender<CacheEvent>,
}

impl NormalizedCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            state: RwLock::new(CacheState::default()),
            next_version: AtomicU64::new(1),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Version for a query execution about to start; later calls always
    /// get higher versions
    pub fn next_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Store the result of a query: entities are normalized, the query keeps
    /// their order. Returns whether anything observable changed.
    pub async fn write_query(&self, key: QueryKey, records: Vec<Record>) -> bool {
        let version = self.next_version();
        self.write_query_versioned(key, version, records).await
    }

    /// Like [`write_query`](Self::write_query), for a result fetched under
    /// `version`. A result older than the one the query holds is dropped.
    pub async fn write_query_versioned(
        &self,
        key: QueryKey,
        version: u64,
        records: Vec<Record>,
    ) -> bool {
        let mut state = self.state.write().await;

        let current = state.versions.get(&key).copied().unwrap_or(0);
        if version < current {
            tracing::debug!(query = %key, version, current, "Dropping out-of-order query result");
            return false;
        }
        state.versions.insert(key.clone(), version);

        let refs: Vec<EntityKey> = records.iter().map(Record::key).collect();
        let mut updated = Vec::new();
        for record in records {
            let entity = record.key();
            if state.upsert(record) {
                updated.push(entity);
            }
        }

        let refs_changed = state.queries.get(&key) != Some(&refs);
        if refs_changed {
            state.queries.insert(key.clone(), refs);
        }
        drop(state);

        tracing::debug!(
            query = %key,
            entities_updated = updated.len(),
            refs_changed,
            "Query result written to cache"
        );

        for entity in &updated {
            self.notify(CacheEvent::EntityUpdated { key: entity.clone() });
        }
        let changed = refs_changed || !updated.is_empty();
        if changed {
            self.notify(CacheEvent::QueryUpdated { key });
        }
        changed
    }

    /// Store a single entity returned by a mutation.
    ///
    /// Query lists are not touched: a new message shows up in a chat's list
    /// only once that query is refreshed.
    pub async fn write_entity(&self, record: Record) -> bool {
        let key = record.key();
        let changed = self.state.write().await.upsert(record);
        if changed {
            tracing::debug!(entity = %key, "Entity written to cache");
            self.notify(CacheEvent::EntityUpdated { key });
        }
        changed
    }

    pub async fn read_query(&self, key: &QueryKey) -> Option<Vec<Record>> {
        let state = self.state.read().await;
        state.queries.get(key).map(|refs| state.resolve(refs))
    }

    /// `GetUserChats` as last materialized
    pub async fn read_chats(&self) -> Option<Vec<Chat>> {
        let records = self.read_query(&QueryKey::UserChats).await?;
        Some(
            records
                .into_iter()
                .filter_map(|r| match r {
                    Record::Chat(chat) => Some(chat),
                    Record::Message(_) => None,
                })
                .collect(),
        )
    }

    /// `GetChatMessages(chat_id)` as last materialized
    pub async fn read_messages(&self, chat_id: &str) -> Option<Vec<Message>> {
        let records = self.read_query(&QueryKey::chat_messages(chat_id)).await?;
        Some(
            records
                .into_iter()
                .filter_map(|r| match r {
                    Record::Message(message) => Some(message),
                    Record::Chat(_) => None,
                })
                .collect(),
        )
    }

    pub async fn read_entity(&self, key: &EntityKey) -> Option<Record> {
        self.state.read().await.entities.get(key).cloned()
    }

    pub async fn contains_query(&self, key: &QueryKey) -> bool {
        self.state.read().await.queries.contains_key(key)
    }

    pub async fn entity_count(&self) -> usize {
        self.state.read().await.entities.len()
    }

    fn notify(&self, event: CacheEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for NormalizedCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(id: &str, chat_id: &str, content: &str, minute: u32) -> Message {
        Message {
            id: id.to_string(),
            chat_id: chat_id.to_string(),
            user_id: Some("u1".to_string()),
            content: content.to_string(),
            is_bot: false,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, minute, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_entities_are_shared_between_queries() {
        let cache = NormalizedCache::new();
        let key = QueryKey::chat_messages("c1");

        cache
            .write_query(key.clone(), vec![message("m1", "c1", "Hello", 0).into()])
            .await;
        cache
            .write_entity(message("m1", "c1", "Hello, edited upstream", 0).into())
            .await;

        let messages = cache.read_messages("c1").await.unwrap();
        assert_eq!(messages[0].content, "Hello, edited upstream");
    }

    #[tokio::test]
    async fn test_identical_write_is_not_a_change() {
        let cache = NormalizedCache::new();
        let key = QueryKey::chat_messages("c1");
        let records: Vec<Record> = vec![message("m1", "c1", "Hello", 0).into()];

        assert!(cache.write_query(key.clone(), records.clone()).await);
        let mut events = cache.subscribe();
        assert!(!cache.write_query(key, records).await);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_write_entity_does_not_touch_query_lists() {
        let cache = NormalizedCache::new();
        cache
            .write_query(QueryKey::chat_messages("c1"), vec![message("m1", "c1", "one", 0).into()])
            .await;

        cache.write_entity(message("m2", "c1", "two", 1).into()).await;

        assert_eq!(cache.read_messages("c1").await.unwrap().len(), 1);
        assert!(cache.read_entity(&EntityKey::message("m2")).await.is_some());
        assert_eq!(cache.entity_count().await, 2);
    }

    #[tokio::test]
    async fn test_older_result_does_not_overwrite_newer() {
        let cache = NormalizedCache::new();
        let key = QueryKey::chat_messages("c1");

        let older = cache.next_version();
        let newer = cache.next_version();

        let latest: Vec<Record> = vec![
            message("m1", "c1", "one", 0).into(),
            message("m2", "c1", "two", 1).into(),
        ];
        assert!(cache.write_query_versioned(key.clone(), newer, latest).await);

        let mut events = cache.subscribe();
        let stale: Vec<Record> = vec![message("m1", "c1", "one", 0).into()];
        assert!(!cache.write_query_versioned(key, older, stale).await);

        assert_eq!(cache.read_messages("c1").await.unwrap().len(), 2);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_query_reads_none() {
        let cache = NormalizedCache::new();
        assert!(cache.read_chats().await.is_none());
        assert!(!cache.contains_query(&QueryKey::UserChats).await);
    }
}
