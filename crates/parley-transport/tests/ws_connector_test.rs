use futures::{SinkExt, StreamExt};
use parley_transport::{
    ConnectionParams, GraphQlRequest, Inbound, StreamConnector, TransportError, WsConnector,
};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type ServerSocket = WebSocketStream<tokio::net::TcpStream>;

async fn accept(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_hdr_async(stream, |_req: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        response.headers_mut().insert(
            "sec-websocket-protocol",
            HeaderValue::from_static("graphql-transport-ws"),
        );
        Ok(response)
    })
    .await
    .unwrap()
}

async fn next_json(socket: &mut ServerSocket) -> Value {
    loop {
        match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            _ => continue,
        }
    }
}

async fn send_json(socket: &mut ServerSocket, value: Value) {
    socket
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_handshake_subscribe_and_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/v1/graphql", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let mut socket = accept(&listener).await;

        let init = next_json(&mut socket).await;
        assert_eq!(init["type"], "connection_init");
        assert_eq!(init["payload"]["headers"]["Authorization"], "Bearer t1");
        send_json(&mut socket, json!({ "type": "connection_ack" })).await;

        let subscribe = next_json(&mut socket).await;
        assert_eq!(subscribe["type"], "subscribe");
        assert_eq!(subscribe["payload"]["operationName"], "SubscribeToChats");
        let id = subscribe["id"].as_str().unwrap().to_string();

        send_json(&mut socket, json!({ "type": "ping" })).await;
        let pong = next_json(&mut socket).await;
        assert_eq!(pong["type"], "pong");

        send_json(
            &mut socket,
            json!({ "type": "next", "id": id, "payload": { "data": { "chats": [] } } }),
        )
        .await;
        socket.close(None).await.unwrap();
    });

    let connector = WsConnector::new(url, Duration::from_secs(2));
    let (inbound, mut frames) = mpsc::unbounded_channel();
    let handle = connector
        .open(ConnectionParams::new(Some("t1".to_string())), inbound)
        .await
        .unwrap();

    let request = GraphQlRequest {
        query: "subscription SubscribeToChats { chats { id } }".to_string(),
        variables: Value::Null,
        operation_name: Some("SubscribeToChats".to_string()),
    };
    handle.start("1", &request).await.unwrap();

    match frames.recv().await.unwrap() {
        Inbound::Next { id, payload } => {
            assert_eq!(id, "1");
            assert_eq!(payload.data, Some(json!({ "chats": [] })));
        }
        other => panic!("Expected Next, got {:?}", other),
    }
    assert!(matches!(frames.recv().await.unwrap(), Inbound::Closed { .. }));

    server.await.unwrap();
    handle.dispose().await.unwrap();
}

#[tokio::test]
async fn test_missing_ack_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/v1/graphql", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let mut socket = accept(&listener).await;
        let _init = next_json(&mut socket).await;
        // Never acknowledge
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let connector = WsConnector::new(url, Duration::from_millis(100));
    let (inbound, _frames) = mpsc::unbounded_channel();
    let result = connector.open(ConnectionParams::new(None), inbound).await;

    assert!(matches!(result, Err(TransportError::AckTimeout(100))));
    server.abort();
}

#[tokio::test]
async fn test_dispose_closes_without_closed_frame() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/v1/graphql", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let mut socket = accept(&listener).await;
        let _init = next_json(&mut socket).await;
        send_json(&mut socket, json!({ "type": "connection_ack" })).await;
        // Drain until the client closes
        while let Some(Ok(message)) = socket.next().await {
            if message.is_close() {
                break;
            }
        }
    });

    let connector = WsConnector::new(url, Duration::from_secs(2));
    let (inbound, mut frames) = mpsc::unbounded_channel();
    let handle = connector
        .open(ConnectionParams::new(None), inbound)
        .await
        .unwrap();

    handle.dispose().await.unwrap();
    // Second dispose is a no-op
    handle.dispose().await.unwrap();

    server.await.unwrap();
    assert!(frames.recv().await.is_none());
}
