//! # Parley
//!
//! Realtime chat sync core: keeps a local view of chats and messages in step
//! with a GraphQL data service, and sends messages to an assistant.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     parley::telemetry::init_logging(&config.logging);
//!
//!     let session = Arc::new(InMemorySession::new());
//!     session.set_token(config.access_token.clone()).await;
//!
//!     let client = SyncClient::builder()
//!         .config(config.transport_config()?)
//!         .session(session)
//!         .build()?;
//!
//!     // Every push on the chat list refetches it into the cache
//!     let feeds = LiveFeedCoordinator::new(client.clone(), FeedBindings::standard());
//!     if let Some(mut feed) = feeds.watch(Some(SubscriptionKey::Chats)).await? {
//!         while let Some(event) = feed.next_event().await {
//!             println!("{:?}", event);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`parley-types`**: chat models, operations, cache and subscription keys
//! - **`parley-transport`**: HTTP request channel, websocket streaming channel
//!   with reconnect-on-credential-change, and the link that routes between them
//! - **`parley-cache`**: normalized entity cache with per-query result lists
//! - **`parley-sync`**: typed chat operations, live feeds and the two-step send
//!
//! ## Features
//!
//! - **Fresh credentials**: every request reads the current token; the
//!   streaming connection is rebuilt when it changes
//! - **Push-triggers-pull**: subscription pushes refetch the matching queries
//! - **Durable sends**: the user's message is never rolled back when the
//!   assistant fails

pub mod config;
pub mod prelude;
pub mod telemetry;

pub use config::{Config, LoggingConfig, TransportSection};

pub use parley_types::{
    ChannelEvent, Chat, ErrorPolicy, FeedEvent, Message, Operation, OperationKind, QueryKey,
    RetryPolicy, SendMessageResult, SubscriptionKey, User,
};

pub use parley_transport::{
    route, Channel, HttpChannel, InMemorySession, RequestTransport, Session, SplitLink,
    StreamConnector, StreamingChannel, Subscription, TransportConfig, TransportError,
    WsConnector,
};

pub use parley_cache::{CacheEvent, EntityKey, NormalizedCache, Record};

pub use parley_sync::{
    default_chat_title, FeedBindings, FetchPolicy, LiveFeed, LiveFeedCoordinator,
    MessageComposer, Rejection, SendOutcome, SyncClient, SyncClientBuilder, SyncError,
};

// Re-export sub-crates for advanced usage
pub use parley_cache as cache;
pub use parley_sync as sync;
pub use parley_transport as transport;
pub use parley_types as types;

#[cfg(test)]
mod tests {
    #[test]
    fn test_sub_crates_reachable_through_meta_crate() {
        assert_eq!(
            crate::transport::route(crate::types::OperationKind::Subscription),
            crate::transport::Channel::Streaming
        );
        assert_eq!(crate::sync::SEND_FAILED, "Failed to send message");
        let _cache = crate::cache::NormalizedCache::default();
    }
}
