pub mod config;
pub mod events;
pub mod keys;
pub mod models;
pub mod operation;

pub use config::RetryPolicy;
pub use events::{ChannelEvent, FeedEvent};
pub use keys::{QueryKey, SubscriptionKey};
pub use models::{Chat, Message, SendMessageResult, User};
pub use operation::{ErrorPolicy, Operation, OperationKind};
