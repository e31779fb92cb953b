//! WebSocket gateway server.

use crate::broker::Broker;
use crate::capability::{Capabilities, Transport};
use crate::dispatcher::Dispatcher;
use crate::error::GatewayError;
use crate::session::SessionRegistry;
use crate::Result;
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serverwamp_core::config::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// WebSocket subprotocol for JSON-serialized WAMP.
pub const WAMP_SUBPROTOCOL: &str = "wamp.2.json";

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Interface to bind.
    pub host: String,

    /// Port number.
    pub port: u16,

    /// Path that upgrades to WAMP.
    pub path: String,

    /// Agent name advertised in WELCOME.
    pub agent_name: String,

    /// Maximum concurrent sessions.
    pub max_connections: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        ServerConfig::default().into()
    }
}

impl From<&ServerConfig> for GatewayConfig {
    fn from(server: &ServerConfig) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
            path: server.path.clone(),
            agent_name: server.agent_name.clone(),
            max_connections: server.max_connections,
        }
    }
}

impl From<ServerConfig> for GatewayConfig {
    fn from(server: ServerConfig) -> Self {
        Self::from(&server)
    }
}

impl GatewayConfig {
    /// Check the settings the router depends on.
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(GatewayError::Internal(format!(
                "WebSocket path must start with '/': {}",
                self.path
            )));
        }
        if self.path == HEALTH_PATH {
            return Err(GatewayError::Internal(format!(
                "WebSocket path collides with {}",
                HEALTH_PATH
            )));
        }
        Ok(())
    }
}

/// Shared server state.
pub struct GatewayState {
    /// Collaborators handed to every dispatcher.
    pub capabilities: Capabilities,

    /// Live sessions.
    pub sessions: Arc<SessionRegistry>,

    /// Broker that receives attach/detach notifications.
    pub broker: Option<Arc<Broker>>,

    /// Configuration.
    pub config: GatewayConfig,
}

impl GatewayState {
    async fn has_capacity(&self) -> bool {
        self.sessions.count().await < self.config.max_connections
    }
}

/// Health endpoint body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub sessions: usize,
}

/// The WebSocket gateway server.
pub struct Gateway {
    config: GatewayConfig,
    capabilities: Capabilities,
    broker: Option<Arc<Broker>>,
    sessions: Arc<SessionRegistry>,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(config: GatewayConfig, capabilities: Capabilities) -> Self {
        Self {
            config,
            capabilities,
            broker: None,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    /// Route subscriptions through `broker` and keep it informed of live sessions.
    pub fn with_broker(mut self, broker: Arc<Broker>) -> Self {
        self.capabilities = self
            .capabilities
            .with_subscribe_handler(broker.clone())
            .with_unsubscribe_handler(broker.clone());
        self.broker = Some(broker);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn broker(&self) -> Option<&Arc<Broker>> {
        self.broker.as_ref()
    }

    /// Build the Axum router.
    pub fn router(&self) -> Router {
        let state = Arc::new(GatewayState {
            capabilities: self.capabilities.clone(),
            sessions: self.sessions.clone(),
            broker: self.broker.clone(),
            config: self.config.clone(),
        });

        Router::new()
            .route(&self.config.path, get(ws_handler))
            .route(HEALTH_PATH, get(health_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and run the gateway server.
    pub async fn run(&self) -> Result<()> {
        self.config.validate()?;
        let listener =
            tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port))
                .await
                .map_err(GatewayError::Io)?;
        self.serve(listener).await
    }

    /// Run the gateway server on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.config.validate()?;
        let app = self.router();
        let addr = listener.local_addr().map_err(GatewayError::Io)?;

        info!(
            "Starting gateway server on ws://{}{} (agent: {})",
            addr, self.config.path, self.config.agent_name
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

        Ok(())
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr.to_string());

    if !state.has_capacity().await {
        warn!(
            "Max connections ({}) reached, rejecting {}",
            state.config.max_connections,
            peer.as_deref().unwrap_or("unknown peer")
        );
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.protocols([WAMP_SUBPROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, state, peer))
}

/// Transport writing into a connection's outbound queue.
struct WsTransport {
    tx: mpsc::UnboundedSender<Message>,
    peer: Option<String>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, text: String) -> Result<()> {
        self.tx
            .send(Message::Text(text))
            .map_err(|_| GatewayError::TransportClosed("websocket writer has stopped".to_string()))
    }

    async fn close(&self) -> Result<()> {
        self.tx
            .send(Message::Close(None))
            .map_err(|_| GatewayError::TransportClosed("websocket writer has stopped".to_string()))
    }

    fn peer_address(&self) -> Option<String> {
        self.peer.clone()
    }
}

/// Run one session to completion.
async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, peer: Option<String>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let transport = Arc::new(WsTransport { tx, peer });
    let mut dispatcher = Dispatcher::new(transport, state.capabilities.clone())
        .with_agent_name(state.config.agent_name.clone());
    let session_id = dispatcher.session().session_id();

    state.sessions.insert(dispatcher.session().clone()).await;
    if let Some(broker) = &state.broker {
        broker.attach(session_id, dispatcher.event_publisher()).await;
    }
    info!(
        session_id,
        remote = dispatcher.session().remote_address().unwrap_or("-"),
        "Client connected"
    );

    // The writer ends once every transport handle is gone or after a close frame.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                debug!(session_id, "Failed to write frame: {}", e);
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Err(e) = dispatcher.handle_incoming(&text).await {
                    error!(session_id, "Transport failure: {}", e);
                    break;
                }
                if dispatcher.is_closed() {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id, "Ignoring binary frame");
            }
            Ok(Message::Close(_)) => {
                debug!(session_id, "Client closed connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                let e = GatewayError::WebSocket(e.to_string());
                warn!(session_id, "{}", e);
                break;
            }
        }
    }

    if let Some(broker) = &state.broker {
        broker.detach(session_id).await;
    }
    state.sessions.remove(session_id).await;
    drop(dispatcher);
    let _ = writer.await;

    info!(session_id, "Client disconnected");
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        sessions: state.sessions.count().await,
    })
}
