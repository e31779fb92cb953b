//! Capabilities injected into the dispatcher.
//!
//! The dispatcher enforces the protocol; everything else (sending bytes,
//! running procedures, tracking subscriptions) is delegated through these
//! traits. Implementations are shared by every session and must tolerate
//! concurrent calls.

use crate::error::GatewayError;
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use serverwamp_core::{
    uri, CapabilityError, IdGenerator, RandomIdGenerator, RpcCall, Session, SubscribeRequest,
    UnsubscribeRequest, WampError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Outbound side of one connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one encoded envelope.
    async fn send(&self, text: String) -> Result<()>;

    /// Close the connection.
    async fn close(&self) -> Result<()>;

    /// Remote peer address, if known.
    fn peer_address(&self) -> Option<String>;
}

/// Hook invoked once a session has been welcomed.
#[async_trait]
pub trait SessionOpenHandler: Send + Sync {
    async fn on_open(&self, session: &Session);
}

/// Executes remote procedure calls.
#[async_trait]
pub trait RpcExecutor: Send + Sync {
    /// Run the call and return its result value.
    async fn execute_call(&self, request: &RpcCall) -> std::result::Result<Value, CapabilityError>;
}

/// Registers topic subscriptions.
#[async_trait]
pub trait SubscribeHandler: Send + Sync {
    /// Register the subscription and return its id.
    async fn subscribe(
        &self,
        request: &SubscribeRequest,
    ) -> std::result::Result<u64, CapabilityError>;
}

/// Removes topic subscriptions.
#[async_trait]
pub trait UnsubscribeHandler: Send + Sync {
    async fn unsubscribe(
        &self,
        request: &UnsubscribeRequest,
    ) -> std::result::Result<(), CapabilityError>;
}

/// Open hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOpenHandler;

#[async_trait]
impl SessionOpenHandler for NoopOpenHandler {
    async fn on_open(&self, _session: &Session) {}
}

/// Executor with no procedures.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProcedures;

#[async_trait]
impl RpcExecutor for NoProcedures {
    async fn execute_call(&self, request: &RpcCall) -> std::result::Result<Value, CapabilityError> {
        Err(WampError::new(uri::NO_SUCH_PROCEDURE)
            .with_args(vec![Value::from(request.uri())])
            .into())
    }
}

/// Registry that refuses every subscription.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSubscriptions;

#[async_trait]
impl SubscribeHandler for NoSubscriptions {
    async fn subscribe(
        &self,
        _request: &SubscribeRequest,
    ) -> std::result::Result<u64, CapabilityError> {
        Err(WampError::new(uri::NOT_IMPLEMENTED).into())
    }
}

#[async_trait]
impl UnsubscribeHandler for NoSubscriptions {
    async fn unsubscribe(
        &self,
        _request: &UnsubscribeRequest,
    ) -> std::result::Result<(), CapabilityError> {
        Err(WampError::new(uri::NOT_IMPLEMENTED).into())
    }
}

/// The set of collaborators a dispatcher delegates to.
#[derive(Clone)]
pub struct Capabilities {
    /// Open hook.
    pub open: Arc<dyn SessionOpenHandler>,

    /// RPC executor.
    pub executor: Arc<dyn RpcExecutor>,

    /// Subscription registry.
    pub subscribe: Arc<dyn SubscribeHandler>,

    /// Unsubscription registry.
    pub unsubscribe: Arc<dyn UnsubscribeHandler>,

    /// Session id source.
    pub ids: Arc<dyn IdGenerator>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            open: Arc::new(NoopOpenHandler),
            executor: Arc::new(NoProcedures),
            subscribe: Arc::new(NoSubscriptions),
            unsubscribe: Arc::new(NoSubscriptions),
            ids: Arc::new(RandomIdGenerator),
        }
    }
}

impl Capabilities {
    /// Create a capability set with default collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open hook.
    pub fn with_open_handler(mut self, open: Arc<dyn SessionOpenHandler>) -> Self {
        self.open = open;
        self
    }

    /// Set the RPC executor.
    pub fn with_executor(mut self, executor: Arc<dyn RpcExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Set the subscribe registry.
    pub fn with_subscribe_handler(mut self, subscribe: Arc<dyn SubscribeHandler>) -> Self {
        self.subscribe = subscribe;
        self
    }

    /// Set the unsubscribe registry.
    pub fn with_unsubscribe_handler(mut self, unsubscribe: Arc<dyn UnsubscribeHandler>) -> Self {
        self.unsubscribe = unsubscribe;
        self
    }

    /// Set the session id generator.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }
}

/// Transport that keeps everything in memory.
///
/// Useful for embedding the dispatcher behind a custom I/O loop and in tests.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    peer: Option<String>,
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
    close_requests: AtomicUsize,
}

impl MemoryTransport {
    /// Create a transport reporting the given peer address.
    pub fn new(peer: Option<String>) -> Self {
        Self {
            peer,
            ..Default::default()
        }
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Drain everything sent so far.
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// How many times `close` was called.
    pub fn close_requests(&self) -> usize {
        self.close_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, text: String) -> Result<()> {
        if self.is_closed() {
            return Err(GatewayError::TransportClosed(
                "memory transport is closed".to_string(),
            ));
        }
        self.sent.lock().push(text);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_requests.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn peer_address(&self) -> Option<String> {
        self.peer.clone()
    }
}
