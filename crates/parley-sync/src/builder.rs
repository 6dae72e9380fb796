use parley_cache::NormalizedCache;
use parley_transport::{
    HttpChannel, RequestTransport, Session, SplitLink, StreamConnector, StreamingChannel,
    TransportConfig, WsConnector,
};
use parley_types::RetryPolicy;
use std::sync::Arc;

use crate::client::SyncClient;
use crate::error::{Result, SyncError};

/// Builder for a [`SyncClient`].
///
/// Either give it a [`TransportConfig`] (HTTP + websocket channels), or plug
/// in both channels directly.
pub struct SyncClientBuilder {
    config: Option<TransportConfig>,
    session: Option<Arc<dyn Session>>,
    request: Option<Arc<dyn RequestTransport>>,
    connector: Option<Arc<dyn StreamConnector>>,
    retry: Option<RetryPolicy>,
    cache: Option<Arc<NormalizedCache>>,
}

impl SyncClientBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            session: None,
            request: None,
            connector: None,
            retry: None,
            cache: None,
        }
    }

    pub fn config(mut self, config: TransportConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Credentials source (required)
    pub fn session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Use a custom request channel instead of HTTP
    pub fn request_transport(mut self, request: Arc<dyn RequestTransport>) -> Self {
        self.request = Some(request);
        self
    }

    /// Use a custom streaming connector instead of the websocket one
    pub fn stream_connector(mut self, connector: Arc<dyn StreamConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Overrides the retry policy from the transport config
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Share an existing cache
    pub fn cache(mut self, cache: Arc<NormalizedCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<SyncClient> {
        let session = self
            .session
            .ok_or_else(|| SyncError::Config("Session is required".to_string()))?;

        if let Some(config) = &self.config {
            config.validate()?;
        }

        let request: Arc<dyn RequestTransport> = match self.request {
            Some(request) => request,
            None => {
                let config = self.config.as_ref().ok_or_else(|| {
                    SyncError::Config("Transport config or request transport is required".to_string())
                })?;
                Arc::new(HttpChannel::new(config.http_url.clone(), Arc::clone(&session))?)
            }
        };

        let connector: Arc<dyn StreamConnector> = match self.connector {
            Some(connector) => connector,
            None => {
                let config = self.config.as_ref().ok_or_else(|| {
                    SyncError::Config("Transport config or stream connector is required".to_string())
                })?;
                Arc::new(WsConnector::from_config(config))
            }
        };

        let retry = self
            .retry
            .or_else(|| self.config.as_ref().map(|c| c.retry.clone()))
            .unwrap_or_default();

        let streaming = StreamingChannel::new(connector, session, retry);
        let cache = self.cache.unwrap_or_default();

        Ok(SyncClient::new(SplitLink::new(request, streaming), cache))
    }
}

impl Default for SyncClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
