//! The single serialized request form shared by client and server.
//!
//! Every call, regardless of verb, travels as one [`Envelope`]: the segment
//! path addressing a leaf of the route tree plus a bag of argument slots.
//! Verbs without a reliable body (GET, DELETE) carry the URL-encoded JSON
//! envelope in the single query key [`DATA_QUERY_KEY`]; all others carry it
//! as the raw JSON request body.

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query-string key carrying the envelope for GET and DELETE calls.
pub const DATA_QUERY_KEY: &str = "data";

/// Whether a verb's envelope travels in the query string instead of the body.
pub fn carries_in_query(method: &Method) -> bool {
    *method == Method::GET || *method == Method::DELETE
}

/// Argument slots of one call. Absent slots are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
}

impl Argument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, value: Value) -> Self {
        self.body = Some(value);
        self
    }

    pub fn query(mut self, value: Value) -> Self {
        self.query = Some(value);
        self
    }

    pub fn params(mut self, value: Value) -> Self {
        self.params = Some(value);
        self
    }

    pub fn headers(mut self, value: Value) -> Self {
        self.headers = Some(value);
        self
    }

    /// Overlay these (explicit) slots on top of preloaded ones: any slot set
    /// here wins wholesale; slots left unset fall through to `base`.
    pub fn overlaid_on(self, base: Argument) -> Argument {
        Argument {
            body: self.body.or(base.body),
            query: self.query.or(base.query),
            params: self.params.or(base.params),
            headers: self.headers.or(base.headers),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_none()
            && self.query.is_none()
            && self.params.is_none()
            && self.headers.is_none()
    }
}

/// The envelope itself: where to go and what to pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub segments: Vec<String>,
    pub argument: Argument,
}

impl Envelope {
    pub fn new(segments: Vec<String>, argument: Argument) -> Self {
        Self { segments, argument }
    }
}
