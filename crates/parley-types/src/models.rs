use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat thread as stored by the backing data service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// Bumped by the store on every message insert; never moves backwards
    pub updated_at: DateTime<Utc>,
}

/// Append-only chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    /// Absent for bot-authored messages
    #[serde(default)]
    pub user_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub is_bot: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_from(&self, user_id: &str) -> bool {
        !self.is_bot && self.user_id.as_deref() == Some(user_id)
    }
}

/// Result of the `sendMessage` action (bot reply)
///
/// The action signals domain failure through `success`/`error`, independently
/// of transport failure. Every field but `success` may be null on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendMessageResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failed(error: Option<String>) -> Self {
        Self {
            success: false,
            error,
            ..Self::default()
        }
    }
}

/// Signed-in user as exposed by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "avatarUrl", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}
