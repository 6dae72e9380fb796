use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

/// Why the access token changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenChange {
    SignedIn,
    Refreshed,
    SignedOut,
}

/// Credentials collaborator owned by the identity provider.
///
/// The transport never mutates the session; it reads the token right before
/// every request and connection attempt, and reacts to change notifications.
#[async_trait]
pub trait Session: Send + Sync {
    /// Current access token, if signed in
    async fn access_token(&self) -> Option<String>;

    /// Notified on sign-in, refresh and sign-out
    fn token_changes(&self) -> broadcast::Receiver<TokenChange>;
}

/// Session backed by a token held in memory.
///
/// Whoever owns the identity flow calls [`InMemorySession::set_token`]; every
/// effective change is broadcast to the transport.
pub struct InMemorySession {
    token: RwLock<Option<String>>,
    changes: broadcast::Sender<TokenChange>,
}

impl InMemorySession {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            token: RwLock::new(None),
            changes,
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            token: RwLock::new(Some(token.into())),
            changes,
        }
    }

    /// Replace the token; returns the change that was broadcast, if any
    pub async fn set_token(&self, token: Option<String>) -> Option<TokenChange> {
        let mut current = self.token.write().await;

        let change = match (current.as_deref(), token.as_deref()) {
            (None, None) => None,
            (Some(old), Some(new)) if old == new => None,
            (None, Some(_)) => Some(TokenChange::SignedIn),
            (Some(_), Some(_)) => Some(TokenChange::Refreshed),
            (Some(_), None) => Some(TokenChange::SignedOut),
        };
        *current = token;
        drop(current);

        if let Some(change) = change {
            // No receivers simply means nothing is connected yet
            let _ = self.changes.send(change);
        }
        change
    }
}

impl Default for InMemorySession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn access_token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    fn token_changes(&self) -> broadcast::Receiver<TokenChange> {
        self.changes.subscribe()
    }
}

/// `Authorization` value for a token; empty when signed out
pub fn bearer(token: Option<&str>) -> String {
    match token {
        Some(token) => format!("Bearer {}", token),
        None => String::new(),
    }
}
