//! End-to-end session flows.
//!
//! These tests wire a router, a broker and several dispatchers together over
//! in-memory transports and check the envelopes each peer observes.

use serde_json::{json, Value};
use serverwamp_cli::commands::serve::demo_routes;
use serverwamp_core::{Event, SequentialIdGenerator, Session};
use serverwamp_gateway::{
    Broker, Capabilities, Dispatcher, MemoryTransport, RpcRouter, SessionOpenHandler,
    SessionState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Peer {
    transport: Arc<MemoryTransport>,
    dispatcher: Dispatcher,
}

impl Peer {
    async fn send(&mut self, envelope: Value) {
        self.dispatcher
            .handle_incoming(&envelope.to_string())
            .await
            .unwrap();
    }

    fn received(&self) -> Vec<Value> {
        self.transport
            .take_sent()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    fn session_id(&self) -> u64 {
        self.dispatcher.session().session_id()
    }
}

struct App {
    broker: Arc<Broker>,
    capabilities: Capabilities,
}

impl App {
    async fn new() -> Self {
        let broker = Arc::new(Broker::with_id_generator(Arc::new(
            SequentialIdGenerator::starting_at(700),
        )));
        let router = RpcRouter::new();
        router.add_routes(demo_routes(broker.clone())).await;

        let capabilities = Capabilities::new()
            .with_executor(Arc::new(router))
            .with_subscribe_handler(broker.clone())
            .with_unsubscribe_handler(broker.clone())
            .with_id_generator(Arc::new(SequentialIdGenerator::starting_at(100)));

        Self {
            broker,
            capabilities,
        }
    }

    async fn connect(&self) -> Peer {
        let transport = Arc::new(MemoryTransport::new(Some("127.0.0.1:40000".into())));
        let dispatcher = Dispatcher::new(transport.clone(), self.capabilities.clone());
        self.broker
            .attach(dispatcher.session().session_id(), dispatcher.event_publisher())
            .await;
        Peer {
            transport,
            dispatcher,
        }
    }

    async fn join(&self) -> Peer {
        let mut peer = self.connect().await;
        peer.send(json!([1, "realm1", {}])).await;
        peer.received();
        peer
    }
}

#[tokio::test]
async fn test_handshake_and_rpc() {
    let app = App::new().await;
    let mut peer = app.connect().await;

    peer.send(json!([1, "realm1", {"roles": {"caller": {}}}])).await;
    assert_eq!(
        peer.received(),
        vec![json!([2, 100, {"roles": {"broker": {}, "dealer": {}}, "agent": "serverwamp"}])]
    );
    assert_eq!(peer.dispatcher.state(), SessionState::Established);

    peer.send(json!([48, 1, "say_hello"])).await;
    peer.send(json!([48, 2, "delayed_echo", ["hi"]])).await;
    peer.send(json!([48, 3, "missing.procedure"])).await;
    assert_eq!(
        peer.received(),
        vec![
            json!([50, 1, "hello"]),
            json!([50, 2, ["hi"]]),
            json!([8, 48, 3, {}, "wamp.error.no_such_procedure", ["missing.procedure"], {}]),
        ]
    );
}

#[tokio::test]
async fn test_bad_demo_arguments_are_invalid_argument() {
    let app = App::new().await;
    let mut peer = app.join().await;

    peer.send(json!([48, 4, "delayed_echo", ["x", 1e300]])).await;
    assert_eq!(
        peer.received(),
        vec![json!([8, 48, 4, {}, "wamp.error.invalid_argument", ["'delay' is out of range"], {}])]
    );
    assert_eq!(peer.dispatcher.state(), SessionState::Established);
}

#[tokio::test]
async fn test_pubsub_between_sessions() {
    let app = App::new().await;
    let mut alice = app.join().await;
    let mut bob = app.join().await;
    assert_ne!(alice.session_id(), bob.session_id());

    alice.send(json!([32, 10, {}, "chat.room"])).await;
    bob.send(json!([32, 11, {}, "chat.room"])).await;
    assert_eq!(alice.received(), vec![json!([33, 10, 700])]);
    assert_eq!(bob.received(), vec![json!([33, 11, 700])]);

    bob.send(json!([48, 12, "demo.publish", ["chat.room", "hello"], {"from": "bob"}]))
        .await;

    let published = alice.received();
    assert_eq!(published.len(), 1);
    let event = &published[0];
    assert_eq!(event[0], json!(36));
    assert_eq!(event[1], json!(700));
    assert!(event[2].is_u64());
    assert_eq!(event[3], json!({}));
    assert_eq!(event[4], json!(["hello"]));
    assert_eq!(event[5], json!({"from": "bob"}));

    let bob_sees = bob.received();
    assert_eq!(bob_sees.len(), 2);
    assert_eq!(bob_sees[0][0], json!(36));
    assert_eq!(
        bob_sees[1],
        json!([50, 12, {"topic": "chat.room", "delivered": 2}])
    );
}

#[tokio::test]
async fn test_unsubscribe_and_detach() {
    let app = App::new().await;
    let mut alice = app.join().await;
    let mut bob = app.join().await;

    alice.send(json!([32, 1, {}, "news"])).await;
    bob.send(json!([32, 1, {}, "news"])).await;
    alice.received();
    bob.received();

    alice.send(json!([34, 2, 700])).await;
    alice.send(json!([34, 3, 700])).await;
    assert_eq!(
        alice.received(),
        vec![
            json!([35, 2]),
            json!([8, 34, 3, {}, "wamp.error.no_such_subscription"]),
        ]
    );

    app.broker.detach(bob.session_id()).await;
    assert!(app.broker.topics().await.is_empty());
    assert_eq!(app.broker.publish("news", Event::with_publication(1)).await, 0);
}

#[tokio::test]
async fn test_violation_closes_only_offending_session() {
    let app = App::new().await;
    let mut good = app.join().await;
    let mut bad = app.join().await;

    bad.send(json!([99, 1])).await;
    assert_eq!(bad.dispatcher.state(), SessionState::Closed);
    assert_eq!(bad.transport.close_requests(), 1);
    assert_eq!(
        bad.received(),
        vec![json!([3, {"message": "Unknown WAMP message type."}, "wamp.error.protocol_violation"])]
    );

    good.send(json!([48, 5, "say_hello"])).await;
    assert_eq!(good.received(), vec![json!([50, 5, "hello"])]);
}

#[tokio::test]
async fn test_events_to_closed_session_are_not_delivered() {
    let app = App::new().await;
    let mut alice = app.join().await;
    let mut bob = app.join().await;
    alice.send(json!([32, 1, {}, "alerts"])).await;
    bob.send(json!([32, 1, {}, "alerts"])).await;
    alice.received();
    bob.received();

    bob.send(json!([1, "realm1", {}])).await;
    assert_eq!(bob.dispatcher.state(), SessionState::Closed);
    bob.received();

    let delivered = app
        .broker
        .publish("alerts", Event::with_publication(5))
        .await;
    assert_eq!(delivered, 1);
    assert_eq!(alice.received(), vec![json!([36, 700, 5, {}])]);
    assert!(bob.received().is_empty());
}

struct CountingOpen(AtomicUsize);

#[async_trait::async_trait]
impl SessionOpenHandler for CountingOpen {
    async fn on_open(&self, _session: &Session) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_open_hook_runs_once_per_session() {
    let app = App::new().await;
    let hook = Arc::new(CountingOpen(AtomicUsize::new(0)));
    let capabilities = app.capabilities.clone().with_open_handler(hook.clone());

    let transport = Arc::new(MemoryTransport::new(None));
    let mut dispatcher = Dispatcher::new(transport.clone(), capabilities);
    dispatcher
        .handle_incoming(r#"[1, "realm1", {}]"#)
        .await
        .unwrap();
    dispatcher
        .handle_incoming(r#"[48, 1, "say_hello"]"#)
        .await
        .unwrap();

    assert_eq!(hook.0.load(Ordering::SeqCst), 1);
    assert_eq!(transport.sent().len(), 2);
}
