//! Procedure routing.

use crate::capability::RpcExecutor;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use serverwamp_core::{uri, CapabilityError, RpcCall, WampError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A single callable procedure.
#[async_trait]
pub trait ProcedureHandler: Send + Sync {
    /// Handle the call.
    async fn call(&self, request: &RpcCall) -> Result<Value, CapabilityError>;
}

/// Adapter turning an async closure into a [`ProcedureHandler`].
///
/// The closure receives its own copy of the call.
pub struct FnProcedure<F>(F);

impl<F, Fut> FnProcedure<F>
where
    F: Fn(RpcCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CapabilityError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> ProcedureHandler for FnProcedure<F>
where
    F: Fn(RpcCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CapabilityError>> + Send,
{
    async fn call(&self, request: &RpcCall) -> Result<Value, CapabilityError> {
        (self.0)(request.clone()).await
    }
}

/// Build an `Arc<dyn ProcedureHandler>` from an async closure.
///
/// ```ignore
/// let echo = procedure!(|call: RpcCall| async move {
///     Ok(Value::Array(call.args().to_vec()))
/// });
/// ```
#[macro_export]
macro_rules! procedure {
    ($f:expr) => {{
        std::sync::Arc::new($crate::rpc::FnProcedure::new($f))
            as std::sync::Arc<dyn $crate::rpc::ProcedureHandler>
    }};
}

/// A batch of routes for bulk registration.
#[derive(Default, Clone)]
pub struct RouteSet {
    routes: Vec<(String, Arc<dyn ProcedureHandler>)>,
}

impl RouteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route.
    pub fn route(mut self, uri: impl Into<String>, handler: Arc<dyn ProcedureHandler>) -> Self {
        self.routes.push((uri.into(), handler));
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn ProcedureHandler>)> {
        self.routes.iter().map(|(uri, handler)| (uri.as_str(), handler))
    }
}

/// Produces the value of a keyword argument the caller left out.
pub type DefaultKwarg = Arc<dyn Fn() -> Value + Send + Sync>;

/// Routes calls to handlers by procedure URI.
pub struct RpcRouter {
    routes: RwLock<HashMap<String, Arc<dyn ProcedureHandler>>>,
    camel_snake: bool,
    defaults: Vec<(String, DefaultKwarg)>,
}

impl Default for RpcRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            camel_snake: false,
            defaults: Vec::new(),
        }
    }

    /// Rewrite camelCase kwargs keys to snake_case before dispatch.
    pub fn with_camel_snake_conversion(mut self, enabled: bool) -> Self {
        self.camel_snake = enabled;
        self
    }

    /// Fill kwarg `name` from `factory` on every call that does not supply it.
    ///
    /// The factory runs once per such call, after any camelCase conversion.
    /// A later registration for the same name replaces the earlier one.
    pub fn with_default_kwarg<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: DefaultKwarg = Arc::new(factory);
        self.defaults.retain(|(existing, _)| *existing != name);
        self.defaults.push((name, factory));
        self
    }

    /// Fill kwarg `name` with a fixed value when the caller omits it.
    pub fn with_default_kwarg_value(self, name: impl Into<String>, value: Value) -> Self {
        self.with_default_kwarg(name, move || value.clone())
    }

    /// Register a handler, replacing any previous one for `uri`.
    pub async fn add_route(&self, uri: impl Into<String>, handler: Arc<dyn ProcedureHandler>) {
        let uri = uri.into();
        debug!("Registering procedure: {}", uri);
        let mut routes = self.routes.write().await;
        routes.insert(uri, handler);
    }

    /// Register every route in the set.
    pub async fn add_routes(&self, set: RouteSet) {
        let mut routes = self.routes.write().await;
        for (uri, handler) in set.routes {
            debug!("Registering procedure: {}", uri);
            routes.insert(uri, handler);
        }
    }

    /// Unregister a procedure.
    pub async fn remove_route(&self, uri: &str) -> bool {
        let mut routes = self.routes.write().await;
        routes.remove(uri).is_some()
    }

    /// Look up the handler for `uri`.
    pub async fn resolve(&self, uri: &str) -> Option<Arc<dyn ProcedureHandler>> {
        let routes = self.routes.read().await;
        routes.get(uri).cloned()
    }

    /// Registered procedure URIs, sorted.
    pub async fn list(&self) -> Vec<String> {
        let routes = self.routes.read().await;
        let mut uris: Vec<String> = routes.keys().cloned().collect();
        uris.sort();
        uris
    }
}

#[async_trait]
impl RpcExecutor for RpcRouter {
    async fn execute_call(&self, request: &RpcCall) -> Result<Value, CapabilityError> {
        let handler = self.resolve(request.uri()).await.ok_or_else(|| {
            WampError::new(uri::NO_SUCH_PROCEDURE).with_args(vec![Value::from(request.uri())])
        })?;

        debug!("Calling procedure: {}", request.uri());
        match self.prepare_kwargs(request.kwargs()) {
            Some(kwargs) => handler.call(&request.clone().with_kwargs(kwargs)).await,
            None => handler.call(request).await,
        }
    }
}

impl RpcRouter {
    /// Kwargs as the handler should see them, or `None` when unchanged.
    fn prepare_kwargs(&self, kwargs: &Map<String, Value>) -> Option<Map<String, Value>> {
        let mut prepared = (self.camel_snake && !kwargs.is_empty()).then(|| snake_keys(kwargs));
        for (name, factory) in &self.defaults {
            let supplied = prepared.as_ref().unwrap_or(kwargs).contains_key(name);
            if !supplied {
                prepared
                    .get_or_insert_with(|| kwargs.clone())
                    .insert(name.clone(), factory());
            }
        }
        prepared
    }
}

static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));

/// `userName` -> `user_name`.
pub fn camel_to_snake(name: &str) -> String {
    CAMEL_BOUNDARY.replace_all(name, "${1}_${2}").to_lowercase()
}

fn snake_keys(kwargs: &Map<String, Value>) -> Map<String, Value> {
    kwargs
        .iter()
        .map(|(key, value)| (camel_to_snake(key), value.clone()))
        .collect()
}
