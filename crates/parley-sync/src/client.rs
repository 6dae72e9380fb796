use parley_cache::{NormalizedCache, Record};
use parley_transport::{SplitLink, Subscription};
use parley_types::{Chat, Message, QueryKey, SendMessageResult, SubscriptionKey};
use std::sync::Arc;

use crate::builder::SyncClientBuilder;
use crate::error::Result;
use crate::operations;

/// How a query read treats the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Serve the materialized result if present, otherwise fetch
    #[default]
    CacheFirst,
    /// Always re-execute against the request channel
    NetworkOnly,
}

/// Typed chat operations over the split link, writing results into the
/// normalized cache.
#[derive(Clone)]
pub struct SyncClient {
    link: SplitLink,
    cache: Arc<NormalizedCache>,
}

impl SyncClient {
    pub fn new(link: SplitLink, cache: Arc<NormalizedCache>) -> Self {
        Self { link, cache }
    }

    pub fn builder() -> SyncClientBuilder {
        SyncClientBuilder::new()
    }

    pub fn cache(&self) -> &Arc<NormalizedCache> {
        &self.cache
    }

    pub fn link(&self) -> &SplitLink {
        &self.link
    }

    pub async fn query(&self, key: &QueryKey, policy: FetchPolicy) -> Result<Vec<Record>> {
        if policy == FetchPolicy::CacheFirst {
            if let Some(records) = self.cache.read_query(key).await {
                return Ok(records);
            }
        }
        self.refresh(key).await?;
        Ok(self.cache.read_query(key).await.unwrap_or_default())
    }

    /// Re-execute a query against the network and write it into the cache;
    /// returns the number of entities materialized
    pub async fn refresh(&self, key: &QueryKey) -> Result<usize> {
        // Taken before the request so a slower, older response loses
        let version = self.cache.next_version();
        let data = self.link.execute(&operations::for_query(key)).await?;
        let records = operations::decode_query(key, data)?;
        let count = records.len();

        self.cache
            .write_query_versioned(key.clone(), version, records)
            .await;
        tracing::debug!(query = %key, entities = count, "Query refreshed");
        Ok(count)
    }

    /// Refresh several queries; one failing does not stop the others
    pub async fn refetch_queries(&self, keys: &[QueryKey]) -> Vec<(QueryKey, Result<usize>)> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push((key.clone(), self.refresh(key).await));
        }
        results
    }

    pub async fn user_chats(&self, policy: FetchPolicy) -> Result<Vec<Chat>> {
        let records = self.query(&QueryKey::UserChats, policy).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| r.as_chat().cloned())
            .collect())
    }

    pub async fn chat_messages(&self, chat_id: &str, policy: FetchPolicy) -> Result<Vec<Message>> {
        let records = self.query(&QueryKey::chat_messages(chat_id), policy).await?;
        Ok(records
            .into_iter()
            .filter_map(|r| r.as_message().cloned())
            .collect())
    }

    /// Create a chat, then refresh the chat list so it shows up
    pub async fn create_chat(&self, title: &str, user_id: &str) -> Result<Chat> {
        let data = self.link.execute(&operations::create_chat(title, user_id)).await?;
        let chat = operations::decode_created_chat(data)?;
        self.cache.write_entity(chat.clone().into()).await;

        tracing::info!(chat_id = %chat.id, title = %chat.title, "Chat created");

        for (key, result) in self.refetch_queries(&[QueryKey::UserChats]).await {
            if let Err(e) = result {
                tracing::warn!(query = %key, error = %e, "Refetch after chat creation failed");
            }
        }
        Ok(chat)
    }

    /// Append the user's message to a chat (`is_bot = false`)
    pub async fn insert_user_message(
        &self,
        chat_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<Message> {
        let data = self
            .link
            .execute(&operations::insert_user_message(chat_id, user_id, content))
            .await?;
        let message = operations::decode_inserted_message(data)?;
        self.cache.write_entity(message.clone().into()).await;
        Ok(message)
    }

    /// Ask the assistant to reply; domain failure is carried in the result
    pub async fn send_message(&self, chat_id: &str, content: &str) -> Result<SendMessageResult> {
        let data = self
            .link
            .execute(&operations::send_message(chat_id, content))
            .await?;
        operations::decode_send_result(data)
    }

    pub async fn subscribe(&self, key: &SubscriptionKey) -> Result<Subscription> {
        Ok(self.link.subscribe(&operations::for_subscription(key)).await?)
    }
}
