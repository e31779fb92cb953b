//! In-memory topic broker.
//!
//! Every topic has at most one subscription id, shared by all sessions
//! subscribed to it. The id is retired when the last member leaves.

use crate::capability::{SubscribeHandler, UnsubscribeHandler};
use crate::dispatcher::EventPublisher;
use async_trait::async_trait;
use serverwamp_core::{
    uri, CapabilityError, Event, IdGenerator, RandomIdGenerator, SubscribeRequest,
    UnsubscribeRequest, WampError,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug)]
struct Subscription {
    topic: String,
    members: HashSet<u64>,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, u64>,
    subscriptions: HashMap<u64, Subscription>,
    publishers: HashMap<u64, EventPublisher>,
}

impl BrokerState {
    fn leave(&mut self, subscription: u64, session_id: u64) -> bool {
        let Some(entry) = self.subscriptions.get_mut(&subscription) else {
            return false;
        };
        if !entry.members.remove(&session_id) {
            return false;
        }
        if entry.members.is_empty() {
            let topic = entry.topic.clone();
            self.subscriptions.remove(&subscription);
            self.topics.remove(&topic);
            debug!(subscription, topic = %topic, "Subscription retired");
        }
        true
    }
}

/// Topic broker shared by every session of a gateway.
pub struct Broker {
    state: RwLock<BrokerState>,
    ids: Arc<dyn IdGenerator>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    /// Create a broker drawing random subscription ids.
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(RandomIdGenerator))
    }

    pub fn with_id_generator(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: RwLock::new(BrokerState::default()),
            ids,
        }
    }

    /// Make a live session reachable for event delivery.
    pub async fn attach(&self, session_id: u64, publisher: EventPublisher) {
        let mut state = self.state.write().await;
        state.publishers.insert(session_id, publisher);
    }

    /// Forget a session and every subscription it held.
    pub async fn detach(&self, session_id: u64) {
        let mut state = self.state.write().await;
        state.publishers.remove(&session_id);

        let held: Vec<u64> = state
            .subscriptions
            .iter()
            .filter(|(_, entry)| entry.members.contains(&session_id))
            .map(|(id, _)| *id)
            .collect();
        for subscription in held {
            state.leave(subscription, session_id);
        }
    }

    /// Deliver an event to every attached subscriber of `topic`.
    ///
    /// Returns the number of successful deliveries.
    pub async fn publish(&self, topic: &str, event: Event) -> usize {
        let targets: Vec<(u64, EventPublisher)> = {
            let state = self.state.read().await;
            let Some(subscription) = state.topics.get(topic).copied() else {
                debug!(topic, "No subscribers for topic");
                return 0;
            };
            state
                .subscriptions
                .get(&subscription)
                .map(|entry| {
                    entry
                        .members
                        .iter()
                        .filter_map(|member| state.publishers.get(member).cloned())
                        .map(|publisher| (subscription, publisher))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut delivered = 0;
        for (subscription, publisher) in targets {
            match publisher.publish_event(subscription, &event).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    session_id = publisher.session_id(),
                    topic,
                    "Event delivery failed: {}",
                    e
                ),
            }
        }
        delivered
    }

    /// Subscription id currently bound to `topic`.
    pub async fn subscription_for(&self, topic: &str) -> Option<u64> {
        let state = self.state.read().await;
        state.topics.get(topic).copied()
    }

    /// Topics with at least one subscriber, sorted.
    pub async fn topics(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut topics: Vec<String> = state.topics.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Sessions currently attached.
    pub async fn attached_count(&self) -> usize {
        let state = self.state.read().await;
        state.publishers.len()
    }
}

#[async_trait]
impl SubscribeHandler for Broker {
    async fn subscribe(&self, request: &SubscribeRequest) -> Result<u64, CapabilityError> {
        if request.uri().is_empty() {
            return Err(WampError::new(uri::INVALID_URI).into());
        }

        let session_id = request.session().session_id();
        let mut state = self.state.write().await;
        let subscription = match state.topics.get(request.uri()).copied() {
            Some(existing) => existing,
            None => {
                let fresh = self.ids.next_id();
                state.topics.insert(request.uri().to_string(), fresh);
                state.subscriptions.insert(
                    fresh,
                    Subscription {
                        topic: request.uri().to_string(),
                        members: HashSet::new(),
                    },
                );
                fresh
            }
        };
        if let Some(entry) = state.subscriptions.get_mut(&subscription) {
            entry.members.insert(session_id);
        }

        debug!(
            session_id,
            subscription,
            topic = request.uri(),
            "Subscribed"
        );
        Ok(subscription)
    }
}

#[async_trait]
impl UnsubscribeHandler for Broker {
    async fn unsubscribe(&self, request: &UnsubscribeRequest) -> Result<(), CapabilityError> {
        let session_id = request.session().session_id();
        let mut state = self.state.write().await;
        if state.leave(request.subscription(), session_id) {
            debug!(
                session_id,
                subscription = request.subscription(),
                "Unsubscribed"
            );
            Ok(())
        } else {
            Err(WampError::new(uri::NO_SUCH_SUBSCRIPTION).into())
        }
    }
}
