//! Outbound event values.

use crate::id::IdGenerator;
use serde_json::{Map, Value};

/// One event delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    publication: u64,
    details: Map<String, Value>,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl Event {
    /// Create an event whose publication id comes from `ids`.
    pub fn new(ids: &dyn IdGenerator) -> Self {
        Self::with_publication(ids.next_id())
    }

    /// Create an event with a caller-chosen publication id.
    pub fn with_publication(publication: u64) -> Self {
        Self {
            publication,
            details: Map::new(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
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

    pub fn publication(&self) -> u64 {
        self.publication
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &Map<String, Value> {
        &self.kwargs
    }
}
