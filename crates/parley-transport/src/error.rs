use parley_types::OperationKind;
use thiserror::Error;

use crate::graphql::GraphQlError;
use crate::link::Channel;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Data service error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("GraphQL error: {}", join_messages(.0))]
    GraphQl(Vec<GraphQlError>),

    #[error("Response carried no data")]
    MissingData,

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Connection not acknowledged within {0} ms")]
    AckTimeout(u64),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("A {kind} cannot be carried by the {channel} channel")]
    WrongChannel { kind: OperationKind, channel: Channel },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::WebSocket(e.to_string())
    }
}

fn join_messages(errors: &[GraphQlError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, TransportError>;
