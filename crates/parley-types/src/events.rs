use serde::{Deserialize, Serialize};

use crate::keys::{QueryKey, SubscriptionKey};

/// Lifecycle of the streaming connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelEvent {
    /// Connection acknowledged and active subscriptions replayed
    Connected {
        generation: u64,
        subscriptions: usize,
    },

    /// Previous connection torn down
    Disposed {
        generation: u64,
    },

    /// Waiting before the next connection attempt
    Reconnecting {
        attempt: u32,
        delay_ms: u64,
    },

    ConnectFailed {
        generation: u64,
        message: String,
    },
}

/// What a live feed did in response to pushes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// The subscription delivered a value (payload itself is not used)
    Pushed {
        key: SubscriptionKey,
    },

    /// A bound query was re-executed and written to the cache
    Refreshed {
        query: QueryKey,
        entities: usize,
    },

    RefreshFailed {
        query: QueryKey,
        message: String,
    },

    /// The subscription stream reported an error
    StreamError {
        message: String,
    },
}
