use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a materialized query held in the cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryKey {
    /// Chats visible to the session, newest activity first
    UserChats,
    /// Messages of one chat, oldest first
    ChatMessages { chat_id: String },
}

impl QueryKey {
    pub fn chat_messages(chat_id: impl Into<String>) -> Self {
        Self::ChatMessages {
            chat_id: chat_id.into(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::UserChats => f.write_str("GetUserChats"),
            QueryKey::ChatMessages { chat_id } => write!(f, "GetChatMessages({})", chat_id),
        }
    }
}

/// Identity of a live subscription feed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionKey {
    Chats,
    Messages { chat_id: String },
}

impl SubscriptionKey {
    pub fn messages(chat_id: impl Into<String>) -> Self {
        Self::Messages {
            chat_id: chat_id.into(),
        }
    }

    /// Messages feed for the selected chat, if any
    pub fn for_chat(chat_id: Option<&str>) -> Option<Self> {
        chat_id.map(Self::messages)
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionKey::Chats => f.write_str("SubscribeToChats"),
            SubscriptionKey::Messages { chat_id } => write!(f, "SubscribeToMessages({})", chat_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_chat_short_circuits_on_none() {
        assert_eq!(SubscriptionKey::for_chat(None), None);
        assert_eq!(
            SubscriptionKey::for_chat(Some("c1")),
            Some(SubscriptionKey::messages("c1"))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(QueryKey::chat_messages("c9").to_string(), "GetChatMessages(c9)");
        assert_eq!(SubscriptionKey::Chats.to_string(), "SubscribeToChats");
    }
}
