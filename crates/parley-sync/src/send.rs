//! Two-step message send: persist the user's message, then ask the assistant
//! to reply.
//!
//! ```text
//! Idle -> Sending -> Settled(Success | PartialFailure | Failure) -> Idle
//! ```
//!
//! Step B only runs after step A succeeded, and step A is never rolled back.
//! A send runs on its own task, so it completes even if the caller goes away.

use parley_types::{Message, SendMessageResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::client::SyncClient;

/// Notice shown when the send could not go through
pub const SEND_FAILED: &str = "Failed to send message";
/// Notice shown when the assistant reported failure without a reason
pub const BOT_REPLY_FAILED: &str = "Failed to send message to bot";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Success,
    /// The user's message exists; the assistant did not reply
    PartialFailure { reason: String },
    /// Nothing was persisted
    Failure { reason: String },
}

impl SendOutcome {
    /// Settle on the assistant's answer to step B
    pub fn from_reply(result: &SendMessageResult) -> Self {
        if let Some(error) = result.error.as_deref().filter(|e| !e.is_empty()) {
            return SendOutcome::PartialFailure {
                reason: error.to_string(),
            };
        }
        if !result.success {
            return SendOutcome::PartialFailure {
                reason: BOT_REPLY_FAILED.to_string(),
            };
        }
        SendOutcome::Success
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SendOutcome::Success => None,
            SendOutcome::PartialFailure { reason } | SendOutcome::Failure { reason } => Some(reason),
        }
    }
}

/// Submission refused locally, before any network call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Message is empty")]
    EmptyContent,
    #[error("No chat selected")]
    NoChatSelected,
    #[error("No signed-in user")]
    MissingUser,
    #[error("A message is already being sent")]
    InFlight,
}

type SentHook = Arc<dyn Fn(&Message) + Send + Sync>;

#[derive(Default)]
struct Surface {
    draft: String,
    chat_id: Option<String>,
    user_id: Option<String>,
    error: Option<String>,
}

struct Shared {
    in_flight: AtomicBool,
    surface: Mutex<Surface>,
}

impl Shared {
    fn surface(&self) -> MutexGuard<'_, Surface> {
        // A panic while holding the lock leaves plain data behind
        self.surface.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases the in-flight flag however the send ends
struct InFlightGuard {
    shared: Arc<Shared>,
}

impl InFlightGuard {
    fn acquire(shared: &Arc<Shared>) -> Option<Self> {
        shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                shared: Arc::clone(shared),
            })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.shared.in_flight.store(false, Ordering::Release);
    }
}

struct SendRequest {
    chat_id: String,
    user_id: String,
    content: String,
}

/// One message input surface: draft, selection, in-flight guard and the
/// dismissible error notice.
#[derive(Clone)]
pub struct MessageComposer {
    client: SyncClient,
    shared: Arc<Shared>,
    on_sent: Option<SentHook>,
}

impl MessageComposer {
    pub fn new(client: SyncClient) -> Self {
        Self {
            client,
            shared: Arc::new(Shared {
                in_flight: AtomicBool::new(false),
                surface: Mutex::new(Surface::default()),
            }),
            on_sent: None,
        }
    }

    /// Called once the user's message exists, whatever the assistant did
    pub fn on_sent(mut self, hook: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.on_sent = Some(Arc::new(hook));
        self
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.shared.surface().draft = text.into();
    }

    pub fn draft(&self) -> String {
        self.shared.surface().draft.clone()
    }

    pub fn select_chat(&self, chat_id: Option<String>) {
        self.shared.surface().chat_id = chat_id;
    }

    pub fn set_user(&self, user_id: Option<String>) {
        self.shared.surface().user_id = user_id;
    }

    /// "Bot is typing"
    pub fn is_sending(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    pub fn error_notice(&self) -> Option<String> {
        self.shared.surface().error.clone()
    }

    pub fn dismiss_error(&self) {
        self.shared.surface().error = None;
    }

    /// Submit the draft and wait for settlement
    pub async fn submit(&self) -> Result<SendOutcome, Rejection> {
        let handle = self.spawn_submit()?;
        Ok(handle.await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Send task did not complete");
            SendOutcome::Failure {
                reason: SEND_FAILED.to_string(),
            }
        }))
    }

    /// Submit the draft; the send proceeds in the background
    pub fn spawn_submit(&self) -> Result<JoinHandle<SendOutcome>, Rejection> {
        let (request, guard) = self.begin()?;

        let client = self.client.clone();
        let shared = Arc::clone(&self.shared);
        let on_sent = self.on_sent.clone();

        Ok(tokio::spawn(async move {
            let _guard = guard;
            let outcome = run_send(&client, &request, on_sent.as_deref()).await;
            if let Some(reason) = outcome.reason() {
                shared.surface().error = Some(reason.to_string());
            }
            outcome
        }))
    }

    /// Validate, take the guard and clear the draft (Idle → Sending)
    fn begin(&self) -> Result<(SendRequest, InFlightGuard), Rejection> {
        let mut surface = self.shared.surface();

        let content = surface.draft.trim().to_string();
        if content.is_empty() {
            return Err(Rejection::EmptyContent);
        }
        let chat_id = surface.chat_id.clone().ok_or(Rejection::NoChatSelected)?;
        let user_id = surface
            .user_id
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or(Rejection::MissingUser)?;
        let guard = InFlightGuard::acquire(&self.shared).ok_or(Rejection::InFlight)?;

        surface.draft.clear();
        surface.error = None;

        Ok((
            SendRequest {
                chat_id,
                user_id,
                content,
            },
            guard,
        ))
    }
}

async fn run_send(
    client: &SyncClient,
    request: &SendRequest,
    on_sent: Option<&(dyn Fn(&Message) + Send + Sync)>,
) -> SendOutcome {
    let message = match client
        .insert_user_message(&request.chat_id, &request.user_id, &request.content)
        .await
    {
        Ok(message) => message,
        Err(e) => {
            tracing::error!(chat_id = %request.chat_id, error = %e, "Failed to persist user message");
            return SendOutcome::Failure {
                reason: SEND_FAILED.to_string(),
            };
        }
    };

    let outcome = match client.send_message(&request.chat_id, &request.content).await {
        Ok(reply) => SendOutcome::from_reply(&reply),
        Err(e) => {
            tracing::error!(chat_id = %request.chat_id, error = %e, "Bot reply request failed");
            SendOutcome::PartialFailure {
                reason: SEND_FAILED.to_string(),
            }
        }
    };

    if let Some(reason) = outcome.reason() {
        tracing::warn!(chat_id = %request.chat_id, message_id = %message.id, reason, "Message sent without bot reply");
    } else {
        tracing::info!(chat_id = %request.chat_id, message_id = %message.id, "Message sent");
    }

    if let Some(hook) = on_sent {
        hook(&message);
    }
    outcome
}
