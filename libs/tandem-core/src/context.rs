//! Read-only view of one incoming request.
//!
//! The chain never touches the transport directly: whatever binding received
//! the request (a directly routed endpoint or the RPC dispatcher) fills the
//! four slots up front, so schema steps stay verb- and transport-agnostic.

use http::Method;
use serde_json::Value;

/// The four named input slots a request exposes to schema steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Body,
    Query,
    Params,
    Headers,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::Body, Slot::Query, Slot::Params, Slot::Headers];

    pub const fn as_str(self) -> &'static str {
        match self {
            Slot::Body => "body",
            Slot::Query => "query",
            Slot::Params => "params",
            Slot::Headers => "headers",
        }
    }
}

/// Immutable per-request context shared by every step of a chain.
///
/// Header names are lowercase regardless of how the transport delivered them.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub body: Value,
    pub query: Value,
    pub params: Value,
    pub headers: Value,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: Value::Null,
            query: Value::Null,
            params: Value::Null,
            headers: Value::Null,
        }
    }

    pub fn slot(&self, slot: Slot) -> &Value {
        match slot {
            Slot::Body => &self.body,
            Slot::Query => &self.query,
            Slot::Params => &self.params,
            Slot::Headers => &self.headers,
        }
    }

    pub fn set_slot(&mut self, slot: Slot, value: Value) {
        match slot {
            Slot::Body => self.body = value,
            Slot::Query => self.query = value,
            Slot::Params => self.params = value,
            Slot::Headers => self.headers = value,
        }
    }

    /// Look up a header by its lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(Value::as_str)
    }
}
