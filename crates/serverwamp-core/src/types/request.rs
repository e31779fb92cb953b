//! Inbound request values.
//!
//! `request_id` is chosen by the peer and echoed verbatim in the reply; it is
//! the only correlation key between a request and its response.

use super::Session;
use serde_json::{Map, Value};

/// Session-opening request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HelloRequest {
    realm: Option<String>,
    details: Map<String, Value>,
}

impl HelloRequest {
    pub fn new(realm: Option<String>, details: Map<String, Value>) -> Self {
        Self { realm, details }
    }

    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }
}

/// Remote procedure call request.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcCall {
    session: Session,
    request_id: u64,
    uri: String,
    options: Map<String, Value>,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl RpcCall {
    /// Create a call with empty options and payload.
    pub fn new(session: Session, request_id: u64, uri: impl Into<String>) -> Self {
        Self {
            session,
            request_id,
            uri: uri.into(),
            options: Map::new(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = options;
        self
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &Map<String, Value> {
        &self.kwargs
    }
}

/// Topic subscription request.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeRequest {
    session: Session,
    request_id: u64,
    options: Map<String, Value>,
    uri: String,
}

impl SubscribeRequest {
    pub fn new(
        session: Session,
        request_id: u64,
        options: Map<String, Value>,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            session,
            request_id,
            options,
            uri: uri.into(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Topic URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

/// Subscription removal request.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsubscribeRequest {
    session: Session,
    request_id: u64,
    subscription: u64,
}

impl UnsubscribeRequest {
    pub fn new(session: Session, request_id: u64, subscription: u64) -> Self {
        Self {
            session,
            request_id,
            subscription,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn subscription(&self) -> u64 {
        self.subscription
    }
}
