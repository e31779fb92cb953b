//! Outbound envelope builders.
//!
//! Pure functions from reply values to envelopes. Every reply shape the
//! dispatcher emits is built here.

use serde_json::{json, Map, Value};
use serverwamp_core::{
    uri, Envelope, Event, MessageType, RpcErrorResponse, RpcResult, SubscribeErrorResponse,
    Subscribed, UnsubscribeErrorResponse, Unsubscribed,
};

/// `[WELCOME, session_id, {roles, agent}]`.
pub fn welcome(session_id: u64, agent_name: &str) -> Envelope {
    Envelope::of(MessageType::Welcome).push(session_id).push(json!({
        "roles": {
            "broker": {},
            "dealer": {}
        },
        "agent": agent_name,
    }))
}

/// `[ABORT, {message?}, "wamp.error.protocol_violation"]`.
pub fn protocol_violation(reason: Option<&str>) -> Envelope {
    let mut details = Map::new();
    if let Some(reason) = reason {
        details.insert("message".to_string(), Value::from(reason));
    }
    Envelope::of(MessageType::Abort)
        .push(details)
        .push(uri::PROTOCOL_VIOLATION)
}

/// `[ERROR, request_id, {}, "wamp.error.not_implemented"]`.
///
/// Unlike the other ERROR replies this one carries no originating type.
pub fn unimplemented(request_id: impl Into<Value>) -> Envelope {
    Envelope::of(MessageType::Error)
        .push(request_id)
        .push(Map::new())
        .push(uri::NOT_IMPLEMENTED)
}

/// `[message_type, request_id, {}, "wamp.error.not_authorized"]`.
pub fn unauthorized(message_type: MessageType, request_id: impl Into<Value>) -> Envelope {
    Envelope::of(message_type)
        .push(request_id)
        .push(Map::new())
        .push(uri::NOT_AUTHORIZED)
}

/// `[ERROR, message_type, request_id, {}, error_uri, message]`.
///
/// Used for delegated faults and for requests with badly typed fields. The
/// request id is echoed as given, even when it is not a valid identifier.
pub fn request_failure(
    message_type: MessageType,
    request_id: impl Into<Value>,
    error_uri: &str,
    message: &str,
) -> Envelope {
    Envelope::of(MessageType::Error)
        .push(message_type.code())
        .push(request_id)
        .push(Map::new())
        .push(error_uri)
        .push(message)
}

/// `[CALL_RESULT, request_id, result]`.
pub fn call_result(result: &RpcResult) -> Envelope {
    Envelope::of(MessageType::CallResult)
        .push(result.request_id())
        .push(result.result().clone())
}

/// `[ERROR, CALL, request_id, details, error_uri, args, kwargs]`.
pub fn call_error(error: &RpcErrorResponse) -> Envelope {
    Envelope::of(MessageType::Error)
        .push(MessageType::Call.code())
        .push(error.request().request_id())
        .push(error.details().clone())
        .push(error.uri())
        .push(error.args().to_vec())
        .push(error.kwargs().clone())
}

/// `[SUBSCRIBED, request_id, subscription_id]`.
pub fn subscribed(reply: &Subscribed) -> Envelope {
    Envelope::of(MessageType::Subscribed)
        .push(reply.request_id())
        .push(reply.subscription())
}

/// `[ERROR, SUBSCRIBE, request_id, details, error_uri]`.
pub fn subscribe_error(error: &SubscribeErrorResponse) -> Envelope {
    Envelope::of(MessageType::Error)
        .push(MessageType::Subscribe.code())
        .push(error.request().request_id())
        .push(error.details().clone())
        .push(error.uri())
}

/// `[UNSUBSCRIBED, request_id]`.
pub fn unsubscribed(reply: &Unsubscribed) -> Envelope {
    Envelope::of(MessageType::Unsubscribed).push(reply.request_id())
}

/// `[ERROR, UNSUBSCRIBE, request_id, details, error_uri]`.
pub fn unsubscribe_error(error: &UnsubscribeErrorResponse) -> Envelope {
    Envelope::of(MessageType::Error)
        .push(MessageType::Unsubscribe.code())
        .push(error.request().request_id())
        .push(error.details().clone())
        .push(error.uri())
}

/// `[EVENT, subscription_id, publication_id, details, args?, kwargs?]`.
///
/// Non-empty kwargs carry args along (possibly empty); otherwise args appear
/// only when non-empty.
pub fn event(subscription: u64, event: &Event) -> Envelope {
    let envelope = Envelope::of(MessageType::Event)
        .push(subscription)
        .push(event.publication())
        .push(event.details().clone());

    if !event.kwargs().is_empty() {
        envelope
            .push(event.args().to_vec())
            .push(event.kwargs().clone())
    } else if !event.args().is_empty() {
        envelope.push(event.args().to_vec())
    } else {
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serverwamp_core::{
        RpcCall, Session, SubscribeRequest, UnsubscribeRequest, WampError,
    };

    fn session() -> Session {
        Session::new(1, None)
    }

    fn value(envelope: Envelope) -> Value {
        Value::Array(envelope.into_fields())
    }

    #[test]
    fn test_welcome() {
        assert_eq!(
            value(welcome(123, "serverwamp")),
            json!([2, 123, {"roles": {"broker": {}, "dealer": {}}, "agent": "serverwamp"}])
        );
    }

    #[test]
    fn test_protocol_violation_with_and_without_reason() {
        assert_eq!(
            value(protocol_violation(Some("Unknown WAMP message type."))),
            json!([3, {"message": "Unknown WAMP message type."}, "wamp.error.protocol_violation"])
        );
        assert_eq!(
            value(protocol_violation(None)),
            json!([3, {}, "wamp.error.protocol_violation"])
        );
    }

    #[test]
    fn test_unimplemented_and_unauthorized() {
        assert_eq!(
            value(unimplemented(5)),
            json!([8, 5, {}, "wamp.error.not_implemented"])
        );
        assert_eq!(
            value(unauthorized(MessageType::Invocation, 6)),
            json!([68, 6, {}, "wamp.error.not_authorized"])
        );
    }

    #[test]
    fn test_call_result() {
        let call = RpcCall::new(session(), 7, "math.add");
        assert_eq!(
            value(call_result(&RpcResult::new(&call, json!(5)))),
            json!([50, 7, 5])
        );
    }

    #[test]
    fn test_call_error_always_carries_payload() {
        let call = RpcCall::new(session(), 7, "math.div");
        let error = RpcErrorResponse::new(call, WampError::new("app.error.div_zero"));
        assert_eq!(
            value(call_error(&error)),
            json!([8, 48, 7, {}, "app.error.div_zero", [], {}])
        );
    }

    #[test]
    fn test_request_failure() {
        assert_eq!(
            value(request_failure(
                MessageType::Call,
                9,
                uri::EXCEPTION_DURING_RPC_CALL,
                "boom"
            )),
            json!([8, 48, 9, {}, "wamp.error.exception_during_rpc_call", "boom"])
        );
        assert_eq!(
            value(request_failure(
                MessageType::Subscribe,
                json!("seven"),
                uri::INVALID_ARGUMENT,
                "bad id"
            )),
            json!([8, 32, "seven", {}, "wamp.error.invalid_argument", "bad id"])
        );
    }

    #[test]
    fn test_subscription_replies() {
        let req = SubscribeRequest::new(session(), 3, Map::new(), "topic.x");
        assert_eq!(
            value(subscribed(&Subscribed::new(&req, 42))),
            json!([33, 3, 42])
        );
        let err = SubscribeErrorResponse::new(req, WampError::new("app.error.denied"));
        assert_eq!(
            value(subscribe_error(&err)),
            json!([8, 32, 3, {}, "app.error.denied"])
        );

        let req = UnsubscribeRequest::new(session(), 4, 42);
        assert_eq!(value(unsubscribed(&Unsubscribed::new(&req))), json!([35, 4]));
        let err = UnsubscribeErrorResponse::new(req, WampError::new(uri::NO_SUCH_SUBSCRIPTION));
        assert_eq!(
            value(unsubscribe_error(&err)),
            json!([8, 34, 4, {}, "wamp.error.no_such_subscription"])
        );
    }

    #[test]
    fn test_event_field_inclusion() {
        let bare = Event::with_publication(10);
        assert_eq!(value(event(87624, &bare)), json!([36, 87624, 10, {}]));

        let positional = Event::with_publication(11).with_args(vec![json!("a1"), json!(3)]);
        assert_eq!(
            value(event(87624, &positional)),
            json!([36, 87624, 11, {}, ["a1", 3]])
        );

        let mut kwargs = Map::new();
        kwargs.insert("k1".into(), json!("v1"));
        let keyword = Event::with_publication(12).with_kwargs(kwargs.clone());
        assert_eq!(
            value(event(87624, &keyword)),
            json!([36, 87624, 12, {}, [], {"k1": "v1"}])
        );

        let both = Event::with_publication(13)
            .with_args(vec![json!(7), json!(8)])
            .with_kwargs(kwargs);
        assert_eq!(
            value(event(87624, &both)),
            json!([36, 87624, 13, {}, [7, 8], {"k1": "v1"}])
        );
    }
}
