//! Prelude module for convenient imports
//!
//! ```rust
//! use parley::prelude::*;
//! ```

pub use crate::{
    Chat, ChannelEvent, Config, FeedBindings, FeedEvent, FetchPolicy, InMemorySession,
    LiveFeed, LiveFeedCoordinator, Message, MessageComposer, QueryKey, Rejection, RetryPolicy,
    SendOutcome, Session, SubscriptionKey, SyncClient, SyncClientBuilder, SyncError,
    TransportConfig, TransportError,
};
