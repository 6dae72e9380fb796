use parley_types::{Chat, Message};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Chat,
    Message,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Chat => write!(f, "Chat"),
            EntityKind::Message => write!(f, "Message"),
        }
    }
}

/// Cache identity of an entity: `(kind, id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn chat(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Chat,
            id: id.into(),
        }
    }

    pub fn message(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Message,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Snapshot of an entity as last observed from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Chat(Chat),
    Message(Message),
}

impl Record {
    pub fn key(&self) -> EntityKey {
        match self {
            Record::Chat(chat) => EntityKey::chat(&chat.id),
            Record::Message(message) => EntityKey::message(&message.id),
        }
    }

    pub fn as_chat(&self) -> Option<&Chat> {
        match self {
            Record::Chat(chat) => Some(chat),
            Record::Message(_) => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Record::Message(message) => Some(message),
            Record::Chat(_) => None,
        }
    }
}

impl From<Chat> for Record {
    fn from(chat: Chat) -> Self {
        Record::Chat(chat)
    }
}

impl From<Message> for Record {
    fn from(message: Message) -> Self {
        Record::Message(message)
    }
}
