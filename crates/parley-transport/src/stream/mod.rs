mod connector;
mod manager;
mod ws;

pub use connector::{ConnectionParams, Inbound, InboundSender, StreamConnector, StreamHandle};
pub use manager::{StreamingChannel, Subscription, SubscriptionItem};
pub use ws::WsConnector;
