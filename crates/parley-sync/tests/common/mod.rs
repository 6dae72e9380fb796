//! In-memory chat data service speaking both channels.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parley_sync::SyncClient;
use parley_transport::{
    ConnectionParams, GraphQlRequest, GraphQlResponse, InMemorySession, Inbound, InboundSender,
    RequestTransport, StreamConnector, StreamHandle, TransportError,
};
use parley_types::{Chat, Message, Operation, RetryPolicy};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const USER: &str = "u1";

#[derive(Debug, Clone)]
pub enum Bot {
    Reply(String),
    Refuse(Option<String>),
    Unreachable,
}

#[derive(Default)]
struct Data {
    chats: Vec<Chat>,
    messages: Vec<Message>,
    clock: i64,
    calls: Vec<String>,
}

impl Data {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + ChronoDuration::seconds(self.clock)
    }

    fn chats_json(&self) -> Value {
        let mut chats = self.chats.clone();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        json!({ "chats": chats })
    }

    fn messages_json(&self, chat_id: &str) -> Value {
        // Insertion order breaks created_at ties (stable sort)
        let mut messages: Vec<&Message> =
            self.messages.iter().filter(|m| m.chat_id == chat_id).collect();
        messages.sort_by_key(|m| m.created_at);
        json!({ "messages": messages })
    }

    fn append(&mut self, chat_id: &str, user_id: Option<&str>, content: &str, is_bot: bool) -> Message {
        let now = self.tick();
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            user_id: user_id.map(str::to_string),
            content: content.to_string(),
            is_bot,
            created_at: now,
        };
        self.messages.push(message.clone());
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.updated_at = now;
        }
        message
    }
}

pub struct Connection {
    pub token: Option<String>,
    inbound: InboundSender,
    subs: Mutex<HashMap<String, GraphQlRequest>>,
    pub disposed: AtomicBool,
}

impl Connection {
    pub fn inbound(&self) -> InboundSender {
        self.inbound.clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.subs.lock().unwrap().len()
    }
}

#[derive(Default)]
struct Store {
    data: Mutex<Data>,
    connections: Mutex<Vec<Arc<Connection>>>,
}

impl Store {
    fn chats_json(&self) -> Value {
        self.data.lock().unwrap().chats_json()
    }

    fn messages_json(&self, chat_id: &str) -> Value {
        self.data.lock().unwrap().messages_json(chat_id)
    }

    fn payload_for(&self, request: &GraphQlRequest) -> Value {
        match request.operation_name.as_deref() {
            Some("SubscribeToMessages") => {
                self.messages_json(request.variables["chatId"].as_str().unwrap_or_default())
            }
            _ => self.chats_json(),
        }
    }

    fn push(&self, connection: &Connection, id: &str, request: &GraphQlRequest) {
        let payload = GraphQlResponse::data(self.payload_for(request));
        let _ = connection.inbound.send(Inbound::Next {
            id: id.to_string(),
            payload,
        });
    }

    /// Live queries: every change re-emits each subscription's current result
    fn publish(&self) {
        let connections = self.connections.lock().unwrap().clone();
        for connection in connections {
            if connection.disposed.load(Ordering::SeqCst) {
                continue;
            }
            let subs = connection.subs.lock().unwrap().clone();
            for (id, request) in &subs {
                self.push(&connection, id, request);
            }
        }
    }
}

pub struct Backend {
    store: Arc<Store>,
    bot: Mutex<Bot>,
    fail_insert: AtomicBool,
    insert_delay: Mutex<Duration>,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(Store::default()),
            bot: Mutex::new(Bot::Reply("Hi! How can I help?".to_string())),
            fail_insert: AtomicBool::new(false),
            insert_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn set_bot(&self, bot: Bot) {
        *self.bot.lock().unwrap() = bot;
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_insert.store(fail, Ordering::SeqCst);
    }

    pub fn delay_inserts(&self, delay: Duration) {
        *self.insert_delay.lock().unwrap() = delay;
    }

    pub fn seed_chat(&self, id: &str, title: &str) -> Chat {
        let mut data = self.store.data.lock().unwrap();
        let now = data.tick();
        let chat = Chat {
            id: id.to_string(),
            user_id: USER.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        data.chats.push(chat.clone());
        chat
    }

    /// Write straight to the store, bypassing the client
    pub fn insert_direct(&self, chat_id: &str, content: &str, is_bot: bool) -> Message {
        let user_id = if is_bot { None } else { Some(USER) };
        let message = self
            .store
            .data
            .lock()
            .unwrap()
            .append(chat_id, user_id, content, is_bot);
        self.store.publish();
        message
    }

    pub fn stored_messages(&self, chat_id: &str) -> Vec<Message> {
        serde_json::from_value(self.store.messages_json(chat_id)["messages"].clone()).unwrap()
    }

    pub fn calls(&self, name: &str) -> usize {
        let data = self.store.data.lock().unwrap();
        data.calls.iter().filter(|c| c.as_str() == name).count()
    }

    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.store.connections.lock().unwrap().clone()
    }
}

fn server_error(message: &str) -> TransportError {
    TransportError::Status {
        status: 500,
        body: message.to_string(),
    }
}

#[async_trait]
impl RequestTransport for Backend {
    async fn execute(&self, operation: &Operation) -> parley_transport::Result<Value> {
        self.store
            .data
            .lock()
            .unwrap()
            .calls
            .push(operation.name.clone());
        let vars = &operation.variables;

        let data = match operation.name.as_str() {
            "GetUserChats" => self.store.chats_json(),
            "GetChatMessages" => self
                .store
                .messages_json(vars["chatId"].as_str().unwrap_or_default()),
            "CreateChat" => {
                let chat = {
                    let mut data = self.store.data.lock().unwrap();
                    let now = data.tick();
                    let chat = Chat {
                        id: uuid::Uuid::new_v4().to_string(),
                        user_id: vars["user_id"].as_str().unwrap_or_default().to_string(),
                        title: vars["title"].as_str().unwrap_or_default().to_string(),
                        created_at: now,
                        updated_at: now,
                    };
                    data.chats.push(chat.clone());
                    chat
                };
                self.store.publish();
                json!({ "insert_chats_one": chat })
            }
            "InsertUserMessage" => {
                let delay = *self.insert_delay.lock().unwrap();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if self.fail_insert.load(Ordering::SeqCst) {
                    return Err(server_error("insert failed"));
                }
                let message = self.store.data.lock().unwrap().append(
                    vars["chatId"].as_str().unwrap_or_default(),
                    vars["user_id"].as_str(),
                    vars["content"].as_str().unwrap_or_default(),
                    false,
                );
                self.store.publish();
                json!({ "insert_messages_one": message })
            }
            "SendMessage" => {
                let bot = self.bot.lock().unwrap().clone();
                let chat_id = vars["chat_id"].as_str().unwrap_or_default().to_string();
                match bot {
                    Bot::Reply(text) => {
                        let reply = self
                            .store
                            .data
                            .lock()
                            .unwrap()
                            .append(&chat_id, None, &text, true);
                        self.store.publish();
                        json!({ "sendMessage": {
                            "id": reply.id, "chat_id": chat_id, "sender_id": null,
                            "content": reply.content, "created_at": reply.created_at,
                            "success": true, "error": null
                        }})
                    }
                    Bot::Refuse(error) => json!({ "sendMessage": {
                        "id": null, "chat_id": chat_id, "sender_id": null, "content": null,
                        "created_at": null, "success": false, "error": error
                    }}),
                    Bot::Unreachable => return Err(server_error("action handler unreachable")),
                }
            }
            other => return Err(server_error(&format!("unknown operation {}", other))),
        };
        Ok(data)
    }
}

struct Handle {
    store: Arc<Store>,
    connection: Arc<Connection>,
}

#[async_trait]
impl StreamHandle for Handle {
    async fn start(&self, id: &str, request: &GraphQlRequest) -> parley_transport::Result<()> {
        self.connection
            .subs
            .lock()
            .unwrap()
            .insert(id.to_string(), request.clone());
        // Live queries emit their current result right away
        self.store.push(&self.connection, id, request);
        Ok(())
    }

    async fn stop(&self, id: &str) -> parley_transport::Result<()> {
        self.connection.subs.lock().unwrap().remove(id);
        Ok(())
    }

    async fn dispose(&self) -> parley_transport::Result<()> {
        self.connection.disposed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl StreamConnector for Backend {
    async fn open(
        &self,
        params: ConnectionParams,
        inbound: InboundSender,
    ) -> parley_transport::Result<Box<dyn StreamHandle>> {
        let connection = Arc::new(Connection {
            token: params.token,
            inbound,
            subs: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
        });
        self.store
            .connections
            .lock()
            .unwrap()
            .push(Arc::clone(&connection));

        Ok(Box::new(Handle {
            store: Arc::clone(&self.store),
            connection,
        }))
    }
}

pub fn client_for(backend: &Arc<Backend>, session: Arc<InMemorySession>) -> SyncClient {
    SyncClient::builder()
        .session(session)
        .request_transport(backend.clone())
        .stream_connector(backend.clone())
        .retry(RetryPolicy::disabled())
        .build()
        .unwrap()
}

pub async fn eventually(what: &str, check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Timed out waiting for {}", what);
}
