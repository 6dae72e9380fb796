//! Frames of the `graphql-transport-ws` subprotocol.
//!
//! The client sends `connection_init` with the credential payload and waits
//! for `connection_ack` before starting any subscription. Each subscription is
//! a `subscribe`/`next*`/`complete` exchange identified by a client-chosen id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::graphql::{GraphQlError, GraphQlRequest, GraphQlResponse};

pub const SUBPROTOCOL: &str = "graphql-transport-ws";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    Subscribe {
        id: String,
        payload: GraphQlRequest,
    },

    Complete {
        id: String,
    },

    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

impl ClientMessage {
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    Next {
        id: String,
        payload: GraphQlResponse,
    },

    Error {
        id: String,
        payload: Vec<GraphQlError>,
    },

    Complete {
        id: String,
    },

    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
