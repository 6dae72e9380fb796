//! Creates a chat, watches it live and sends one message to the assistant.
//!
//! ```text
//! PARLEY_ACCESS_TOKEN=... cargo run --bin chat-session -- "Hello!"
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use parley::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    parley::telemetry::init_logging(&config.logging);

    let text = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Hello! Can you help me with Rust?".to_string());
    let user_id = std::env::var("PARLEY_USER_ID").context("PARLEY_USER_ID is required")?;

    println!("Parley - Chat Session");
    println!("=====================\n");

    let session = Arc::new(InMemorySession::new());
    session.set_token(config.access_token.clone()).await;

    let client = SyncClient::builder()
        .config(config.transport_config()?)
        .session(session)
        .build()?;

    // 1. Create a chat
    let title = parley::default_chat_title(Utc::now().date_naive());
    let chat = client.create_chat(&title, &user_id).await?;
    println!("1. Created chat {} ({})\n", chat.title, chat.id);

    // Watch it: every push refetches the message list
    let feeds = LiveFeedCoordinator::new(client.clone(), FeedBindings::standard());
    let mut feed = feeds
        .watch(SubscriptionKey::for_chat(Some(&chat.id)))
        .await?
        .context("Feed for the selected chat")?;

    let watcher = tokio::spawn(async move {
        while let Some(event) = feed.next_event().await {
            match event {
                FeedEvent::Refreshed { query, entities } => {
                    println!("   [feed] {} now has {} entries", query, entities)
                }
                FeedEvent::RefreshFailed { query, message } => {
                    println!("   [feed] refresh of {} failed: {}", query, message)
                }
                FeedEvent::StreamError { message } => {
                    println!("   [feed] stream error: {}", message)
                }
                FeedEvent::Pushed { .. } => {}
            }
        }
    });

    // 2. Send a message
    println!("2. Sending: {}", text);
    let composer = MessageComposer::new(client.clone()).on_sent(|message| {
        tracing::info!(message_id = %message.id, "User message stored");
    });
    composer.select_chat(Some(chat.id.clone()));
    composer.set_user(Some(user_id));
    composer.set_draft(text);

    match composer.submit().await? {
        SendOutcome::Success => println!("   ✓ Assistant replied\n"),
        SendOutcome::PartialFailure { reason } => println!("   ! Stored without reply: {}\n", reason),
        SendOutcome::Failure { reason } => println!("   ✗ {}\n", reason),
    }

    // Give the live feed a moment to settle
    tokio::time::sleep(Duration::from_secs(2)).await;
    watcher.abort();

    // 3. Print the conversation from the cache
    println!("3. Conversation:");
    for message in client.chat_messages(&chat.id, FetchPolicy::CacheFirst).await? {
        let who = if message.is_bot { "assistant" } else { "you" };
        println!("   {:>9}: {}", who, message.content);
    }

    Ok(())
}
