//! Replies and the narrowing combinators that consume them.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use tandem_core::JsonObject;

/// Result tag of a reply synthesized for a locally aborted call.
pub const RESULT_ABORT: &str = "abort";

#[derive(Debug, Error)]
pub enum ClientError {
    /// The call's cancellation token fired before a reply arrived.
    #[error("request aborted")]
    Aborted,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("reply body is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("wire envelope could not be serialized: {0}")]
    Envelope(#[source] serde_json::Error),
    #[error("reply payload did not match the expected shape: {0}")]
    Payload(#[source] serde_json::Error),
    /// A narrowing combinator saw a tag it was not told to keep. The full
    /// reply is preserved so callers can still inspect it.
    #[error("unexpected reply: {} ({})", .0.result(), .0.message().unwrap_or("no message"))]
    UnexpectedReply(CallReply),
}

/// One reply from a wire call: the result tag, the transport status (absent
/// for synthetic local replies), and the remaining payload fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CallReply {
    result: String,
    status_code: Option<u16>,
    payload: JsonObject,
}

impl CallReply {
    /// Assemble a reply from the transport status and the decoded JSON body.
    /// The `result` tag is lifted out of the body; a `statusCode` field in
    /// the body is discarded in favor of the status line.
    pub(crate) fn from_wire(status: u16, body: Value) -> Self {
        let mut payload = match body {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        let result = match payload.remove("result") {
            Some(Value::String(tag)) => tag,
            _ => "unknown".to_string(),
        };
        payload.remove("statusCode");
        Self {
            result,
            status_code: Some(status),
            payload,
        }
    }

    /// The synthetic reply a locally aborted call narrows into; it never
    /// touched the transport, so it carries no status code.
    pub fn aborted() -> Self {
        let mut payload = Map::new();
        payload.insert(
            "message".to_string(),
            Value::String("Request aborted".to_string()),
        );
        Self {
            result: RESULT_ABORT.to_string(),
            status_code: None,
            payload,
        }
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn is(&self, result: &str) -> bool {
        self.result == result
    }

    pub fn payload(&self) -> &JsonObject {
        &self.payload
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    pub fn message(&self) -> Option<&str> {
        self.field("message").and_then(Value::as_str)
    }

    /// Deserialize the whole payload into a typed value.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(ClientError::Payload)
    }

    /// Keep the reply only if it is tagged `success`.
    pub fn expect_success(self) -> Result<Self, ClientError> {
        self.expect_one_of(&["success"])
    }

    /// Keep the reply only if its tag is one of `results`.
    pub fn expect_one_of(self, results: &[&str]) -> Result<Self, ClientError> {
        if results.contains(&self.result.as_str()) {
            Ok(self)
        } else {
            Err(ClientError::UnexpectedReply(self))
        }
    }
}

/// Narrowing combinators over whole call results.
pub trait ReplyResultExt {
    /// Fold a local abort into the reply space as [`CallReply::aborted`];
    /// every other error passes through.
    fn or_abort(self) -> Result<CallReply, ClientError>;

    /// Keep `success` replies, turn everything else into an error.
    fn expect_success(self) -> Result<CallReply, ClientError>;

    /// Keep replies whose tag is in `results`, turn everything else into an
    /// error.
    fn expect_one_of(self, results: &[&str]) -> Result<CallReply, ClientError>;
}

impl ReplyResultExt for Result<CallReply, ClientError> {
    fn or_abort(self) -> Result<CallReply, ClientError> {
        match self {
            Err(ClientError::Aborted) => Ok(CallReply::aborted()),
            other => other,
        }
    }

    fn expect_success(self) -> Result<CallReply, ClientError> {
        self?.expect_success()
    }

    fn expect_one_of(self, results: &[&str]) -> Result<CallReply, ClientError> {
        self?.expect_one_of(results)
    }
}
