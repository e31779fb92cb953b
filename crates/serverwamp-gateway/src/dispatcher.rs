//! Per-connection protocol dispatcher.
//!
//! A [`Dispatcher`] owns one session. It decodes inbound envelopes, checks
//! that the peer may send them in the current state, delegates to the
//! injected [`Capabilities`] and writes exactly the reply the protocol
//! demands.
//!
//! ```text
//! AwaitingHello --HELLO--> Established --violation--> Closed
//!       |                                               ^
//!       +-------------------violation-------------------+
//! ```
//!
//! Envelopes are handled strictly one at a time: each request is fully
//! resolved, reply included, before `handle_incoming` returns.

use crate::capability::{Capabilities, Transport};
use crate::error::GatewayError;
use crate::outbound;
use crate::Result;
use futures::FutureExt;
use serde_json::{Map, Value};
use serverwamp_core::id::is_valid_id;
use serverwamp_core::{
    codec, uri, CapabilityError, Envelope, Event, HelloRequest, MessageType, ProtocolError,
    RpcCall, RpcErrorResponse, RpcResult, Session, SubscribeErrorResponse, SubscribeRequest,
    Subscribed, UnsubscribeErrorResponse, UnsubscribeRequest, Unsubscribed,
};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Agent name advertised when none is configured.
pub const DEFAULT_AGENT_NAME: &str = "serverwamp";

/// Lifecycle state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted; only HELLO is legal.
    AwaitingHello,
    /// WELCOME sent; requests are served.
    Established,
    /// ABORT sent and close requested. Terminal.
    Closed,
}

/// Protocol state machine for one connection.
pub struct Dispatcher {
    session: Session,
    state: SessionState,
    closed: Arc<AtomicBool>,
    transport: Arc<dyn Transport>,
    capabilities: Capabilities,
    agent_name: String,
}

impl Dispatcher {
    /// Create a dispatcher for a freshly accepted connection.
    ///
    /// The session id is drawn from the capability set's id generator.
    pub fn new(transport: Arc<dyn Transport>, capabilities: Capabilities) -> Self {
        let session = Session::open(capabilities.ids.as_ref(), transport.peer_address());
        Self {
            session,
            state: SessionState::AwaitingHello,
            closed: Arc::new(AtomicBool::new(false)),
            transport,
            capabilities,
            agent_name: DEFAULT_AGENT_NAME.to_string(),
        }
    }

    /// Set the agent name advertised in WELCOME.
    pub fn with_agent_name(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = agent_name.into();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Handle for pushing events to this session from other tasks.
    pub fn event_publisher(&self) -> EventPublisher {
        EventPublisher {
            session_id: self.session.session_id(),
            closed: self.closed.clone(),
            transport: self.transport.clone(),
        }
    }

    /// Push one event to the peer.
    pub async fn publish_event(&self, subscription: u64, event: &Event) -> Result<()> {
        self.event_publisher()
            .publish_event(subscription, event)
            .await
    }

    /// Feed one raw inbound envelope.
    ///
    /// Protocol problems are answered on the wire; the returned error only
    /// reports transport failures.
    pub async fn handle_incoming(&mut self, text: &str) -> Result<()> {
        if self.is_closed() {
            debug!(
                session_id = self.session.session_id(),
                "Dropping envelope received after close"
            );
            return Ok(());
        }

        let envelope = match codec::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => return self.reject(e).await,
        };

        let message_type = match envelope.message_type() {
            Ok(message_type) => message_type,
            Err(e) => return self.reject(e).await,
        };

        debug!(
            session_id = self.session.session_id(),
            message_type = %message_type,
            state = ?self.state,
            "Received envelope"
        );

        match (self.state, message_type) {
            (SessionState::AwaitingHello, MessageType::Hello) => self.recv_hello(&envelope).await,
            (SessionState::AwaitingHello, other) => {
                self.abort(Some(&format!("{} received before HELLO", other)))
                    .await
            }
            (SessionState::Established, MessageType::Call) => self.recv_call(&envelope).await,
            (SessionState::Established, MessageType::Subscribe) => {
                self.recv_subscribe(&envelope).await
            }
            (SessionState::Established, MessageType::Unsubscribe) => {
                self.recv_unsubscribe(&envelope).await
            }
            (SessionState::Established, other)
                if other.is_server_only() || other.is_unimplemented() =>
            {
                match raw_request_id(&envelope) {
                    Ok(request_id) => {
                        self.reject(ProtocolError::IllegalForRole {
                            message_type: other,
                            request_id: request_id.clone(),
                        })
                        .await
                    }
                    Err(e) => self.reject(e).await,
                }
            }
            (SessionState::Established, MessageType::Hello) => {
                self.abort(Some("HELLO received on an established session"))
                    .await
            }
            (SessionState::Established, other) => {
                self.abort(Some(&format!("{} is not accepted from a client", other)))
                    .await
            }
            (SessionState::Closed, _) => Ok(()),
        }
    }

    async fn recv_hello(&mut self, envelope: &Envelope) -> Result<()> {
        let hello = HelloRequest::new(
            envelope.get(1).and_then(Value::as_str).map(str::to_string),
            envelope
                .get(2)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        );

        self.send(outbound::welcome(self.session.session_id(), &self.agent_name))
            .await?;
        self.state = SessionState::Established;

        info!(
            session_id = self.session.session_id(),
            remote = self.session.remote_address().unwrap_or("-"),
            realm = hello.realm().unwrap_or("-"),
            "Session established"
        );

        let open = self.capabilities.open.clone();
        let outcome = AssertUnwindSafe(open.on_open(&self.session))
            .catch_unwind()
            .await;
        if let Err(panic) = outcome {
            warn!(
                session_id = self.session.session_id(),
                "Open hook panicked: {}",
                panic_message(panic)
            );
        }
        Ok(())
    }

    async fn recv_call(&mut self, envelope: &Envelope) -> Result<()> {
        let call = match parse_call(&self.session, envelope) {
            Ok(call) => call,
            Err(e) => return self.reject(e).await,
        };
        debug!(
            session_id = self.session.session_id(),
            request_id = call.request_id(),
            uri = call.uri(),
            "Executing call"
        );

        let executor = self.capabilities.executor.clone();
        let outcome = guarded(executor.execute_call(&call)).await;
        let reply = match outcome {
            Ok(result) => outbound::call_result(&RpcResult::new(&call, result)),
            Err(CapabilityError::Wamp(error)) => {
                outbound::call_error(&RpcErrorResponse::new(call, error))
            }
            Err(CapabilityError::Fault(message)) => {
                warn!(
                    session_id = self.session.session_id(),
                    request_id = call.request_id(),
                    uri = call.uri(),
                    "Call failed: {}",
                    message
                );
                outbound::request_failure(
                    MessageType::Call,
                    call.request_id(),
                    uri::EXCEPTION_DURING_RPC_CALL,
                    &message,
                )
            }
        };
        self.send(reply).await
    }

    async fn recv_subscribe(&mut self, envelope: &Envelope) -> Result<()> {
        let request = match parse_subscribe(&self.session, envelope) {
            Ok(request) => request,
            Err(e) => return self.reject(e).await,
        };

        let registry = self.capabilities.subscribe.clone();
        let outcome = guarded(registry.subscribe(&request)).await;
        let outcome = outcome.and_then(|subscription| {
            if is_valid_id(subscription) {
                Ok(subscription)
            } else {
                Err(CapabilityError::fault(format!(
                    "subscription id {} is outside [1, 2^53]",
                    subscription
                )))
            }
        });
        let reply = match outcome {
            Ok(subscription) => outbound::subscribed(&Subscribed::new(&request, subscription)),
            Err(CapabilityError::Wamp(error)) => {
                outbound::subscribe_error(&SubscribeErrorResponse::new(request, error))
            }
            Err(CapabilityError::Fault(message)) => {
                warn!(
                    session_id = self.session.session_id(),
                    request_id = request.request_id(),
                    uri = request.uri(),
                    "Subscribe failed: {}",
                    message
                );
                outbound::request_failure(
                    MessageType::Subscribe,
                    request.request_id(),
                    uri::EXCEPTION_DURING_RPC_CALL,
                    &message,
                )
            }
        };
        self.send(reply).await
    }

    async fn recv_unsubscribe(&mut self, envelope: &Envelope) -> Result<()> {
        let request = match parse_unsubscribe(&self.session, envelope) {
            Ok(request) => request,
            Err(e) => return self.reject(e).await,
        };

        let registry = self.capabilities.unsubscribe.clone();
        let outcome = guarded(registry.unsubscribe(&request)).await;
        let reply = match outcome {
            Ok(()) => outbound::unsubscribed(&Unsubscribed::new(&request)),
            Err(CapabilityError::Wamp(error)) => {
                outbound::unsubscribe_error(&UnsubscribeErrorResponse::new(request, error))
            }
            Err(CapabilityError::Fault(message)) => {
                warn!(
                    session_id = self.session.session_id(),
                    request_id = request.request_id(),
                    subscription = request.subscription(),
                    "Unsubscribe failed: {}",
                    message
                );
                outbound::request_failure(
                    MessageType::Unsubscribe,
                    request.request_id(),
                    uri::EXCEPTION_DURING_RPC_CALL,
                    &message,
                )
            }
        };
        self.send(reply).await
    }

    /// Answer a protocol error the way its class demands.
    async fn reject(&mut self, error: ProtocolError) -> Result<()> {
        if error.is_session_fatal() {
            debug!(
                session_id = self.session.session_id(),
                "Session-fatal protocol error: {}",
                error
            );
            return self.abort(Some(&abort_reason(error))).await;
        }

        match error {
            ProtocolError::IllegalForRole {
                message_type,
                request_id,
            } => {
                warn!(
                    session_id = self.session.session_id(),
                    message_type = %message_type,
                    request_id = %request_id,
                    "Rejecting message not accepted from a client"
                );
                if message_type.is_unimplemented() {
                    self.send(outbound::unimplemented(request_id)).await
                } else {
                    self.send(outbound::unauthorized(message_type, request_id))
                        .await
                }
            }
            ProtocolError::RequestValidation {
                message_type,
                request_id,
                reason,
            } => {
                warn!(
                    session_id = self.session.session_id(),
                    message_type = %message_type,
                    request_id = %request_id,
                    "Invalid request: {}",
                    reason
                );
                self.send(outbound::request_failure(
                    message_type,
                    request_id,
                    uri::INVALID_ARGUMENT,
                    &reason,
                ))
                .await
            }
            // Answered with ABORT above.
            ProtocolError::MalformedEnvelope(_) | ProtocolError::UnknownMessageType(_) => Ok(()),
        }
    }

    /// Enter `Closed`, send ABORT and close the transport.
    async fn abort(&mut self, reason: Option<&str>) -> Result<()> {
        self.state = SessionState::Closed;
        self.closed.store(true, Ordering::SeqCst);

        info!(
            session_id = self.session.session_id(),
            reason = reason.unwrap_or("-"),
            "Aborting session: protocol violation"
        );

        let sent = self
            .transport
            .send(codec::encode(&outbound::protocol_violation(reason)))
            .await;
        let closed = self.transport.close().await;
        sent.and(closed)
    }

    async fn send(&self, envelope: Envelope) -> Result<()> {
        self.transport.send(codec::encode(&envelope)).await
    }
}

/// Cloneable handle that pushes events to one session.
#[derive(Clone)]
pub struct EventPublisher {
    session_id: u64,
    closed: Arc<AtomicBool>,
    transport: Arc<dyn Transport>,
}

impl EventPublisher {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Send `[EVENT, subscription, publication, details, args?, kwargs?]`.
    ///
    /// Both ids must lie in `[1, 2^53]`; nothing is sent otherwise.
    pub async fn publish_event(&self, subscription: u64, event: &Event) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(GatewayError::TransportClosed(format!(
                "session {} is closed",
                self.session_id
            )));
        }
        if !is_valid_id(subscription) || !is_valid_id(event.publication()) {
            return Err(GatewayError::Internal(format!(
                "event ids out of range (subscription {}, publication {})",
                subscription,
                event.publication()
            )));
        }
        debug!(
            session_id = self.session_id,
            subscription,
            publication = event.publication(),
            "Publishing event"
        );
        self.transport
            .send(codec::encode(&outbound::event(subscription, event)))
            .await
    }
}

/// Await a capability, turning a panic into a fault.
async fn guarded<T, F>(future: F) -> std::result::Result<T, CapabilityError>
where
    F: Future<Output = std::result::Result<T, CapabilityError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(CapabilityError::Fault(panic_message(panic))),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn abort_reason(error: ProtocolError) -> String {
    match error {
        ProtocolError::MalformedEnvelope(reason) => reason,
        ProtocolError::UnknownMessageType(_) => "Unknown WAMP message type.".to_string(),
        other => other.to_string(),
    }
}

/// Field 1 as received. Without it no reply can be correlated.
fn raw_request_id(envelope: &Envelope) -> std::result::Result<&Value, ProtocolError> {
    envelope
        .get(1)
        .ok_or_else(|| ProtocolError::MalformedEnvelope("request id is missing".to_string()))
}

/// Field 1 as an identifier. A present but unusable value is answered
/// per request, echoing it verbatim.
fn request_id(
    message_type: MessageType,
    envelope: &Envelope,
) -> std::result::Result<u64, ProtocolError> {
    let raw = raw_request_id(envelope)?;
    raw.as_u64()
        .filter(|id| is_valid_id(*id))
        .ok_or_else(|| ProtocolError::RequestValidation {
            message_type,
            request_id: raw.clone(),
            reason: "request id must be an integer in [1, 2^53]".to_string(),
        })
}

fn invalid(message_type: MessageType, request_id: u64, reason: &str) -> ProtocolError {
    ProtocolError::RequestValidation {
        message_type,
        request_id: Value::from(request_id),
        reason: reason.to_string(),
    }
}

fn optional_args(
    envelope: &Envelope,
    index: usize,
    message_type: MessageType,
    request_id: u64,
) -> std::result::Result<Vec<Value>, ProtocolError> {
    match envelope.get(index) {
        None => Ok(Vec::new()),
        Some(Value::Array(args)) => Ok(args.clone()),
        Some(_) => Err(invalid(message_type, request_id, "args must be an array")),
    }
}

fn optional_kwargs(
    envelope: &Envelope,
    index: usize,
    message_type: MessageType,
    request_id: u64,
) -> std::result::Result<Map<String, Value>, ProtocolError> {
    match envelope.get(index) {
        None => Ok(Map::new()),
        Some(Value::Object(kwargs)) => Ok(kwargs.clone()),
        Some(_) => Err(invalid(message_type, request_id, "kwargs must be an object")),
    }
}

/// `[CALL, request_id, uri, args?, kwargs?]`
fn parse_call(session: &Session, envelope: &Envelope) -> std::result::Result<RpcCall, ProtocolError> {
    let request_id = request_id(MessageType::Call, envelope)?;
    let uri = envelope
        .get(2)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(MessageType::Call, request_id, "procedure URI must be a string"))?;
    let args = optional_args(envelope, 3, MessageType::Call, request_id)?;
    let kwargs = optional_kwargs(envelope, 4, MessageType::Call, request_id)?;

    Ok(RpcCall::new(session.clone(), request_id, uri)
        .with_args(args)
        .with_kwargs(kwargs))
}

/// `[SUBSCRIBE, request_id, options, uri]`
fn parse_subscribe(
    session: &Session,
    envelope: &Envelope,
) -> std::result::Result<SubscribeRequest, ProtocolError> {
    let request_id = request_id(MessageType::Subscribe, envelope)?;
    let options = envelope
        .get(2)
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| invalid(MessageType::Subscribe, request_id, "options must be an object"))?;
    let uri = envelope
        .get(3)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(MessageType::Subscribe, request_id, "topic URI must be a string"))?;

    Ok(SubscribeRequest::new(session.clone(), request_id, options, uri))
}

/// `[UNSUBSCRIBE, request_id, subscription_id]`
fn parse_unsubscribe(
    session: &Session,
    envelope: &Envelope,
) -> std::result::Result<UnsubscribeRequest, ProtocolError> {
    let request_id = request_id(MessageType::Unsubscribe, envelope)?;
    let subscription = envelope
        .get(2)
        .and_then(Value::as_u64)
        .filter(|id| is_valid_id(*id))
        .ok_or_else(|| {
            invalid(
                MessageType::Unsubscribe,
                request_id,
                "subscription id must be an integer in [1, 2^53]",
            )
        })?;

    Ok(UnsubscribeRequest::new(session.clone(), request_id, subscription))
}
