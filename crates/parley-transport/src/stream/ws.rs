//! `graphql-transport-ws` connector over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::connector::{ConnectionParams, Inbound, InboundSender, StreamConnector, StreamHandle};
use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::graphql::GraphQlRequest;
use crate::protocol::{ClientMessage, ServerMessage, SUBPROTOCOL};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Command {
    Send(ClientMessage),
    Close,
}

pub struct WsConnector {
    url: String,
    ack_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, ack_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            ack_timeout,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.ws_url.clone(), config.connect_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn handshake(&self, params: &ConnectionParams) -> Result<WsStream> {
        let mut request = self.url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));

        let (mut ws, _) = connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        let init = ClientMessage::ConnectionInit {
            payload: Some(params.payload()),
        };
        ws.send(Message::Text(init.to_text()?.into())).await?;

        let timeout_ms = self.ack_timeout.as_millis() as u64;
        tokio::time::timeout(self.ack_timeout, wait_for_ack(&mut ws))
            .await
            .map_err(|_| TransportError::AckTimeout(timeout_ms))??;

        Ok(ws)
    }
}

async fn wait_for_ack(ws: &mut WsStream) -> Result<()> {
    while let Some(frame) = ws.next().await {
        match frame? {
            Message::Text(text) => match ServerMessage::parse(text.as_str())? {
                ServerMessage::ConnectionAck { .. } => return Ok(()),
                ServerMessage::Ping { .. } => {
                    let pong = ClientMessage::Pong { payload: None };
                    ws.send(Message::Text(pong.to_text()?.into())).await?;
                }
                other => {
                    tracing::debug!(frame = ?other, "Ignoring frame before connection_ack");
                }
            },
            Message::Close(frame) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .unwrap_or_else(|| "closed before connection_ack".to_string());
                return Err(TransportError::ConnectFailed(reason));
            }
            _ => {}
        }
    }
    Err(TransportError::ConnectionClosed)
}

#[async_trait]
impl StreamConnector for WsConnector {
    async fn open(
        &self,
        params: ConnectionParams,
        inbound: InboundSender,
    ) -> Result<Box<dyn StreamHandle>> {
        let ws = self.handshake(&params).await?;
        tracing::info!(url = %self.url, "Streaming connection acknowledged");

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(connection_loop(ws, cmd_rx, inbound));

        Ok(Box::new(WsHandle {
            cmd_tx,
            task: Mutex::new(Some(task)),
        }))
    }
}

struct WsHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsHandle {
    fn send(&self, message: ClientMessage) -> Result<()> {
        self.cmd_tx
            .send(Command::Send(message))
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn take_task(&self) -> Option<JoinHandle<()>> {
        self.task.lock().ok().and_then(|mut task| task.take())
    }
}

#[async_trait]
impl StreamHandle for WsHandle {
    async fn start(&self, id: &str, request: &GraphQlRequest) -> Result<()> {
        self.send(ClientMessage::Subscribe {
            id: id.to_string(),
            payload: request.clone(),
        })
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.send(ClientMessage::Complete { id: id.to_string() })
    }

    async fn dispose(&self) -> Result<()> {
        let Some(task) = self.take_task() else {
            return Ok(());
        };

        if self.cmd_tx.send(Command::Close).is_err() {
            // Loop already gone; nothing left to close
            return Ok(());
        }
        task.await
            .map_err(|e| TransportError::WebSocket(format!("connection task failed: {}", e)))
    }
}

impl Drop for WsHandle {
    fn drop(&mut self) {
        if let Some(task) = self.take_task() {
            task.abort();
        }
    }
}

async fn connection_loop(
    ws: WsStream,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    inbound: InboundSender,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let reason = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(message)) => {
                        let text = match message.to_text() {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to encode client frame");
                                continue;
                            }
                        };
                        if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                            break Some(e.to_string());
                        }
                    }
                    // Disposed by the owner: close quietly, no Closed notification
                    Some(Command::Close) | None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        let _ = ws_tx.close().await;
                        return;
                    }
                }
            }
            frame = ws_rx.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                };

                match frame {
                    Message::Text(text) => {
                        let message = match ServerMessage::parse(text.as_str()) {
                            Ok(message) => message,
                            Err(e) => {
                                tracing::warn!(error = %e, "Dropping malformed server frame");
                                continue;
                            }
                        };
                        let delivered = match message {
                            ServerMessage::Next { id, payload } => inbound.send(Inbound::Next { id, payload }),
                            ServerMessage::Error { id, payload } => inbound.send(Inbound::Error { id, errors: payload }),
                            ServerMessage::Complete { id } => inbound.send(Inbound::Complete { id }),
                            ServerMessage::Ping { .. } => {
                                let pong = ClientMessage::Pong { payload: None };
                                if let Ok(text) = pong.to_text() {
                                    if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                                        break Some(e.to_string());
                                    }
                                }
                                Ok(())
                            }
                            ServerMessage::Pong { .. } | ServerMessage::ConnectionAck { .. } => Ok(()),
                        };
                        if delivered.is_err() {
                            // Nobody is listening anymore
                            let _ = ws_tx.close().await;
                            return;
                        }
                    }
                    Message::Close(frame) => break frame.map(|f| f.reason.to_string()),
                    _ => {}
                }
            }
        }
    };

    tracing::warn!(reason = ?reason, "Streaming connection closed by peer");
    let _ = inbound.send(Inbound::Closed { reason });
}
