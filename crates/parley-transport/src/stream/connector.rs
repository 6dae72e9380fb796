use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::graphql::{GraphQlError, GraphQlRequest, GraphQlResponse};
use crate::session::bearer;

/// Connection-level parameters, resolved once per connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub token: Option<String>,
}

impl ConnectionParams {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }

    /// `connection_init` payload understood by the data service
    pub fn payload(&self) -> Value {
        json!({
            "headers": {
                "Authorization": bearer(self.token.as_deref()),
            }
        })
    }
}

/// Frame delivered by an open connection
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Next {
        id: String,
        payload: GraphQlResponse,
    },
    Error {
        id: String,
        errors: Vec<GraphQlError>,
    },
    Complete {
        id: String,
    },
    /// Peer or network ended the connection (not sent after `dispose`)
    Closed {
        reason: Option<String>,
    },
}

pub type InboundSender = mpsc::UnboundedSender<Inbound>;

/// Opens streaming connections.
///
/// `open` resolves once the connection is usable (handshake acknowledged);
/// every frame it receives afterwards goes to `inbound`.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn open(
        &self,
        params: ConnectionParams,
        inbound: InboundSender,
    ) -> Result<Box<dyn StreamHandle>>;
}

/// One open connection
#[async_trait]
pub trait StreamHandle: Send + Sync {
    async fn start(&self, id: &str, request: &GraphQlRequest) -> Result<()>;

    async fn stop(&self, id: &str) -> Result<()>;

    /// Tear the connection down; no frames are delivered afterwards
    async fn dispose(&self) -> Result<()>;
}
