//! WebSocket gateway integration tests.
//!
//! These tests run the gateway on an ephemeral loopback port and talk to it
//! with a real WebSocket client.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use serverwamp_cli::commands::serve::demo_routes;
use serverwamp_gateway::{Broker, Capabilities, Gateway, GatewayConfig, RpcRouter, WAMP_SUBPROTOCOL};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start(config: GatewayConfig) -> SocketAddr {
    let broker = Arc::new(Broker::new());
    let router = RpcRouter::new();
    router.add_routes(demo_routes(broker.clone())).await;

    let gateway = Gateway::new(config, Capabilities::new().with_executor(Arc::new(router)))
        .with_broker(broker);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = gateway.serve(listener).await;
    });
    addr
}

async fn connect(addr: SocketAddr) -> Result<Client, WsError> {
    let mut request = format!("ws://{}/ws", addr).into_client_request()?;
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static(WAMP_SUBPROTOCOL),
    );
    let (client, response) = connect_async(request).await?;
    assert_eq!(
        response
            .headers()
            .get("sec-websocket-protocol")
            .and_then(|v| v.to_str().ok()),
        Some(WAMP_SUBPROTOCOL)
    );
    Ok(client)
}

async fn send(client: &mut Client, envelope: Value) {
    client
        .send(Message::Text(envelope.to_string()))
        .await
        .unwrap();
}

async fn next_frame(client: &mut Client) -> Option<Message> {
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for a frame")
        .and_then(|frame| frame.ok())
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        match next_frame(client).await {
            Some(Message::Text(text)) => return serde_json::from_str(&text).unwrap(),
            Some(Message::Ping(_)) | Some(Message::Pong(_)) => continue,
            other => panic!("expected a text frame, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_handshake_and_call_over_websocket() {
    let addr = start(GatewayConfig {
        agent_name: "ws-test".into(),
        ..Default::default()
    })
    .await;
    let mut client = connect(addr).await.unwrap();

    send(&mut client, json!([1, "realm1", {}])).await;
    let welcome = next_json(&mut client).await;
    assert_eq!(welcome[0], json!(2));
    assert!(welcome[1].is_u64());
    assert_eq!(welcome[2]["agent"], json!("ws-test"));

    send(&mut client, json!([48, 1, "say_hello"])).await;
    assert_eq!(next_json(&mut client).await, json!([50, 1, "hello"]));
}

#[tokio::test]
async fn test_subscribe_and_receive_event_over_websocket() {
    let addr = start(GatewayConfig::default()).await;
    let mut subscriber = connect(addr).await.unwrap();
    let mut publisher = connect(addr).await.unwrap();

    for client in [&mut subscriber, &mut publisher] {
        send(client, json!([1, "realm1", {}])).await;
        next_json(client).await;
    }

    send(&mut subscriber, json!([32, 1, {}, "room"])).await;
    let subscribed = next_json(&mut subscriber).await;
    assert_eq!(subscribed[0], json!(33));
    let subscription = subscribed[2].clone();

    send(&mut publisher, json!([48, 2, "demo.publish", ["room", "hi"]])).await;
    assert_eq!(
        next_json(&mut publisher).await,
        json!([50, 2, {"topic": "room", "delivered": 1}])
    );

    let event = next_json(&mut subscriber).await;
    assert_eq!(event[0], json!(36));
    assert_eq!(event[1], subscription);
    assert_eq!(event[4], json!(["hi"]));
}

#[tokio::test]
async fn test_violation_aborts_and_closes_socket() {
    let addr = start(GatewayConfig::default()).await;
    let mut client = connect(addr).await.unwrap();

    send(&mut client, json!([48, 1, "say_hello"])).await;
    assert_eq!(
        next_json(&mut client).await,
        json!([3, {"message": "CALL received before HELLO"}, "wamp.error.protocol_violation"])
    );
    assert!(matches!(
        next_frame(&mut client).await,
        Some(Message::Close(_)) | None
    ));
}

#[tokio::test]
async fn test_connections_beyond_limit_are_refused() {
    let addr = start(GatewayConfig {
        max_connections: 1,
        ..Default::default()
    })
    .await;

    let mut first = connect(addr).await.unwrap();
    send(&mut first, json!([1, "realm1", {}])).await;
    next_json(&mut first).await;

    match connect(addr).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 503),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("second connection should be refused"),
    }
}
