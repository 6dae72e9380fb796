// Request/response channel for queries and mutations

use async_trait::async_trait;
use parley_types::Operation;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{Result, TransportError};
use crate::graphql::{GraphQlRequest, GraphQlResponse};
use crate::link::Channel;
use crate::session::Session;

/// Executes one query or mutation per call.
///
/// No retries: transport and server failures surface to the caller as-is.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    async fn execute(&self, operation: &Operation) -> Result<Value>;
}

/// GraphQL over HTTP POST (no SDK)
pub struct HttpChannel {
    http_client: reqwest::Client,
    url: String,
    session: Arc<dyn Session>,
}

impl HttpChannel {
    pub fn new(url: impl Into<String>, session: Arc<dyn Session>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            url: url.into(),
            session,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bearer header from a freshly resolved token; `None` when signed out
    async fn authorization(&self) -> Result<Option<HeaderValue>> {
        match self.session.access_token().await {
            Some(token) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| TransportError::InvalidHeader(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RequestTransport for HttpChannel {
    async fn execute(&self, operation: &Operation) -> Result<Value> {
        if operation.is_subscription() {
            return Err(TransportError::WrongChannel {
                kind: operation.kind,
                channel: Channel::Request,
            });
        }

        let payload = GraphQlRequest::from(operation);
        let mut request = self.http_client.post(&self.url).json(&payload);

        if let Some(authorization) = self.authorization().await? {
            request = request.header(AUTHORIZATION, authorization);
        }

        tracing::debug!(operation = %operation.name, kind = %operation.kind, "Sending request");

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let body: GraphQlResponse = serde_json::from_str(&text)?;
        body.into_result_with(operation.error_policy)
    }
}
