pub mod builder;
pub mod client;
pub mod error;
pub mod feed;
pub mod operations;
pub mod send;

pub use builder::SyncClientBuilder;
pub use client::{FetchPolicy, SyncClient};
pub use error::{Result, SyncError};
pub use feed::{FeedBindings, LiveFeed, LiveFeedCoordinator};
pub use operations::default_chat_title;
pub use send::{MessageComposer, Rejection, SendOutcome, BOT_REPLY_FAILED, SEND_FAILED};
