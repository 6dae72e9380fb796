pub mod config;
pub mod error;
pub mod graphql;
pub mod link;
pub mod protocol;
pub mod request;
pub mod session;
pub mod stream;

pub use config::TransportConfig;
pub use error::{Result, TransportError};
pub use graphql::{GraphQlError, GraphQlRequest, GraphQlResponse};
pub use link::{route, Channel, Dispatched, SplitLink};
pub use request::{HttpChannel, RequestTransport};
pub use session::{bearer, InMemorySession, Session, TokenChange};
pub use stream::{
    ConnectionParams, Inbound, InboundSender, StreamConnector, StreamHandle, StreamingChannel,
    Subscription, SubscriptionItem, WsConnector,
};
