//! Routes each operation to the channel that carries it.

use parley_types::{Operation, OperationKind};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::request::{HttpChannel, RequestTransport};
use crate::session::Session;
use crate::stream::{StreamingChannel, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Request,
    Streaming,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Request => write!(f, "request"),
            Channel::Streaming => write!(f, "streaming"),
        }
    }
}

/// Subscriptions go to the streaming channel, everything else to the request channel
pub fn route(kind: OperationKind) -> Channel {
    match kind {
        OperationKind::Subscription => Channel::Streaming,
        OperationKind::Query | OperationKind::Mutation => Channel::Request,
    }
}

/// Result of dispatching an operation through the link
#[derive(Debug)]
pub enum Dispatched {
    Response(Value),
    Stream(Subscription),
}

/// Split link over both channels
#[derive(Clone)]
pub struct SplitLink {
    request: Arc<dyn RequestTransport>,
    streaming: StreamingChannel,
}

impl SplitLink {
    pub fn new(request: Arc<dyn RequestTransport>, streaming: StreamingChannel) -> Self {
        Self { request, streaming }
    }

    /// HTTP request channel plus websocket streaming channel
    pub fn from_config(config: &TransportConfig, session: Arc<dyn Session>) -> Result<Self> {
        config.validate()?;

        let request = HttpChannel::new(config.http_url.clone(), Arc::clone(&session))?;
        let streaming = StreamingChannel::from_config(config, session);

        Ok(Self::new(Arc::new(request), streaming))
    }

    pub async fn dispatch(&self, operation: &Operation) -> Result<Dispatched> {
        let channel = route(operation.kind);
        tracing::debug!(operation = %operation.name, channel = %channel, "Dispatching operation");

        match channel {
            Channel::Request => Ok(Dispatched::Response(self.request.execute(operation).await?)),
            Channel::Streaming => Ok(Dispatched::Stream(self.streaming.subscribe(operation).await?)),
        }
    }

    /// Query or mutation; subscriptions are rejected
    pub async fn execute(&self, operation: &Operation) -> Result<Value> {
        match route(operation.kind) {
            Channel::Request => self.request.execute(operation).await,
            channel => Err(TransportError::WrongChannel {
                kind: operation.kind,
                channel,
            }),
        }
    }

    pub async fn subscribe(&self, operation: &Operation) -> Result<Subscription> {
        self.streaming.subscribe(operation).await
    }

    pub fn streaming(&self) -> &StreamingChannel {
        &self.streaming
    }
}
