//! Reply values produced for inbound requests.

use super::{RpcCall, SubscribeRequest, UnsubscribeRequest};
use crate::error::WampError;
use serde_json::{Map, Value};

/// Successful call outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResult {
    request_id: u64,
    result: Value,
}

impl RpcResult {
    pub fn new(request: &RpcCall, result: Value) -> Self {
        Self {
            request_id: request.request_id(),
            result,
        }
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn result(&self) -> &Value {
        &self.result
    }
}

/// Successful subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscribed {
    request_id: u64,
    subscription: u64,
}

impl Subscribed {
    pub fn new(request: &SubscribeRequest, subscription: u64) -> Self {
        Self {
            request_id: request.request_id(),
            subscription,
        }
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn subscription(&self) -> u64 {
        self.subscription
    }
}

/// Successful unsubscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Unsubscribed {
    request_id: u64,
}

impl Unsubscribed {
    pub fn new(request: &UnsubscribeRequest) -> Self {
        Self {
            request_id: request.request_id(),
        }
    }

    pub fn request_id(&self) -> u64 {
        self.request_id
    }
}

/// Failed call, carrying the full error payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcErrorResponse {
    request: RpcCall,
    error: WampError,
}

impl RpcErrorResponse {
    pub fn new(request: RpcCall, error: WampError) -> Self {
        Self { request, error }
    }

    pub fn request(&self) -> &RpcCall {
        &self.request
    }

    pub fn uri(&self) -> &str {
        self.error.uri()
    }

    pub fn details(&self) -> &Map<String, Value> {
        self.error.details()
    }

    pub fn args(&self) -> &[Value] {
        self.error.args()
    }

    pub fn kwargs(&self) -> &Map<String, Value> {
        self.error.kwargs()
    }
}

/// Failed subscription. Only the URI and details reach the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeErrorResponse {
    request: SubscribeRequest,
    uri: String,
    details: Map<String, Value>,
}

impl SubscribeErrorResponse {
    pub fn new(request: SubscribeRequest, error: WampError) -> Self {
        Self {
            request,
            uri: error.uri().to_string(),
            details: error.details().clone(),
        }
    }

    pub fn request(&self) -> &SubscribeRequest {
        &self.request
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }
}

/// Failed unsubscription. Only the URI and details reach the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsubscribeErrorResponse {
    request: UnsubscribeRequest,
    uri: String,
    details: Map<String, Value>,
}

impl UnsubscribeErrorResponse {
    pub fn new(request: UnsubscribeRequest, error: WampError) -> Self {
        Self {
            request,
            uri: error.uri().to_string(),
            details: error.details().clone(),
        }
    }

    pub fn request(&self) -> &UnsubscribeRequest {
        &self.request
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Session;
    use serde_json::json;

    #[test]
    fn test_rpc_result_echoes_request_id() {
        let call = RpcCall::new(Session::new(1, None), 7, "math.add");
        let result = RpcResult::new(&call, json!(5));
        assert_eq!(result.request_id(), 7);
        assert_eq!(result.result(), &json!(5));
    }

    #[test]
    fn test_rpc_error_response_exposes_payload() {
        let call = RpcCall::new(Session::new(1, None), 9, "math.div");
        let mut kwargs = Map::new();
        kwargs.insert("divisor".into(), json!(0));
        let error = WampError::new("app.error.division_by_zero")
            .with_args(vec![json!("cannot divide")])
            .with_kwargs(kwargs);
        let response = RpcErrorResponse::new(call, error);
        assert_eq!(response.request().request_id(), 9);
        assert_eq!(response.uri(), "app.error.division_by_zero");
        assert_eq!(response.args(), &[json!("cannot divide")]);
        assert_eq!(response.kwargs().get("divisor"), Some(&json!(0)));
    }

    #[test]
    fn test_subscribe_error_keeps_details_only() {
        let req = SubscribeRequest::new(Session::new(1, None), 3, Map::new(), "topic.x");
        let mut details = Map::new();
        details.insert("reason".into(), json!("denied"));
        let response = SubscribeErrorResponse::new(
            req,
            WampError::new("app.error.denied")
                .with_details(details)
                .with_args(vec![json!(1)]),
        );
        assert_eq!(response.uri(), "app.error.denied");
        assert_eq!(response.details().get("reason"), Some(&json!("denied")));
    }
}
