//! GraphQL documents of the chat data service and their typed decoders.

use chrono::NaiveDate;
use parley_cache::Record;
use parley_types::{
    Chat, ErrorPolicy, Message, Operation, QueryKey, SendMessageResult, SubscriptionKey,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{Result, SyncError};

pub const GET_USER_CHATS: &str = r#"
query GetUserChats {
  chats(order_by: {updated_at: desc}) {
    id
    user_id
    title
    created_at
    updated_at
  }
}"#;

pub const GET_CHAT_MESSAGES: &str = r#"
query GetChatMessages($chatId: uuid!) {
  messages(where: {chat_id: {_eq: $chatId}}, order_by: {created_at: asc}) {
    id
    chat_id
    user_id
    content
    is_bot
    created_at
  }
}"#;

pub const CREATE_CHAT: &str = r#"
mutation CreateChat($title: String!, $user_id: uuid!) {
  insert_chats_one(object: {title: $title, user_id: $user_id}) {
    id
    user_id
    title
    created_at
    updated_at
  }
}"#;

pub const INSERT_USER_MESSAGE: &str = r#"
mutation InsertUserMessage($chatId: uuid!, $user_id: uuid!, $content: String!) {
  insert_messages_one(object: {
    chat_id: $chatId,
    user_id: $user_id,
    content: $content,
    is_bot: false
  }) {
    id
    chat_id
    user_id
    content
    is_bot
    created_at
  }
}"#;

pub const SEND_MESSAGE: &str = r#"
mutation SendMessage($chat_id: uuid!, $content: String!) {
  sendMessage(chat_id: $chat_id, content: $content) {
    id
    chat_id
    sender_id
    content
    created_at
    success
    error
  }
}"#;

pub const SUBSCRIBE_TO_CHATS: &str = r#"
subscription SubscribeToChats {
  chats(order_by: {updated_at: desc}) {
    id
    title
    updated_at
  }
}"#;

pub const SUBSCRIBE_TO_MESSAGES: &str = r#"
subscription SubscribeToMessages($chatId: uuid!) {
  messages(where: {chat_id: {_eq: $chatId}}, order_by: {created_at: asc}) {
    id
    chat_id
    user_id
    content
    is_bot
    created_at
  }
}"#;

pub fn get_user_chats() -> Operation {
    Operation::new("GetUserChats", GET_USER_CHATS)
}

/// Partial message lists are still shown when some fields fail
pub fn get_chat_messages(chat_id: &str) -> Operation {
    Operation::new("GetChatMessages", GET_CHAT_MESSAGES)
        .with_variables(json!({ "chatId": chat_id }))
        .with_error_policy(ErrorPolicy::All)
}

pub fn create_chat(title: &str, user_id: &str) -> Operation {
    Operation::new("CreateChat", CREATE_CHAT)
        .with_variables(json!({ "title": title, "user_id": user_id }))
}

pub fn insert_user_message(chat_id: &str, user_id: &str, content: &str) -> Operation {
    Operation::new("InsertUserMessage", INSERT_USER_MESSAGE).with_variables(json!({
        "chatId": chat_id,
        "user_id": user_id,
        "content": content,
    }))
}

pub fn send_message(chat_id: &str, content: &str) -> Operation {
    Operation::new("SendMessage", SEND_MESSAGE)
        .with_variables(json!({ "chat_id": chat_id, "content": content }))
}

pub fn subscribe_to_chats() -> Operation {
    Operation::new("SubscribeToChats", SUBSCRIBE_TO_CHATS)
}

pub fn subscribe_to_messages(chat_id: &str) -> Operation {
    Operation::new("SubscribeToMessages", SUBSCRIBE_TO_MESSAGES)
        .with_variables(json!({ "chatId": chat_id }))
}

/// Operation materializing a cached query
pub fn for_query(key: &QueryKey) -> Operation {
    match key {
        QueryKey::UserChats => get_user_chats(),
        QueryKey::ChatMessages { chat_id } => get_chat_messages(chat_id),
    }
}

pub fn for_subscription(key: &SubscriptionKey) -> Operation {
    match key {
        SubscriptionKey::Chats => subscribe_to_chats(),
        SubscriptionKey::Messages { chat_id } => subscribe_to_messages(chat_id),
    }
}

/// Title given to chats created from the sidebar
pub fn default_chat_title(date: NaiveDate) -> String {
    format!("Chat {}", date.format("%Y-%m-%d"))
}

/// Take `field` out of a `data` object and deserialize it
pub fn decode_field<T: DeserializeOwned>(
    operation: &'static str,
    mut data: Value,
    field: &'static str,
) -> Result<T> {
    let value = data
        .get_mut(field)
        .map(Value::take)
        .filter(|v| !v.is_null())
        .ok_or(SyncError::MissingField { operation, field })?;

    serde_json::from_value(value).map_err(|source| SyncError::Decode { operation, source })
}

/// Decode a query result into the records it materializes
pub fn decode_query(key: &QueryKey, data: Value) -> Result<Vec<Record>> {
    match key {
        QueryKey::UserChats => {
            let chats: Vec<Chat> = decode_field("GetUserChats", data, "chats")?;
            Ok(chats.into_iter().map(Record::from).collect())
        }
        QueryKey::ChatMessages { .. } => {
            let messages: Vec<Message> = decode_field("GetChatMessages", data, "messages")?;
            Ok(messages.into_iter().map(Record::from).collect())
        }
    }
}

pub fn decode_created_chat(data: Value) -> Result<Chat> {
    decode_field("CreateChat", data, "insert_chats_one")
}

pub fn decode_inserted_message(data: Value) -> Result<Message> {
    decode_field("InsertUserMessage", data, "insert_messages_one")
}

pub fn decode_send_result(data: Value) -> Result<SendMessageResult> {
    decode_field("SendMessage", data, "sendMessage")
}
