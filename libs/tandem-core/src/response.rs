//! Tagged response envelope shared by every chain.
//!
//! A response is one `result` tag, one status code, and an open JSON payload.
//! The tag space is open; three tags are conventional and constructed here.
//! On the wire the body carries `{ "result": <tag>, ...payload }` while the
//! status code travels on the HTTP status line only; the client re-attaches
//! it from the transport status.

use http::StatusCode;
use serde_json::{Map, Value};

use crate::schema::Issue;

/// Conventional tag for a successful response.
pub const RESULT_SUCCESS: &str = "success";
/// Conventional tag for a schema validation failure.
pub const RESULT_VALIDATION_ERROR: &str = "validation-error";
/// Conventional tag for an unexpected server-side fault.
pub const RESULT_UNEXPECTED_ERROR: &str = "unexpected-error";

/// A tagged response produced by a halting step or a terminal handler.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    result: String,
    status: StatusCode,
    payload: Map<String, Value>,
}

impl ApiResponse {
    /// Build a response with a custom tag.
    ///
    /// Object payloads are spread into the envelope; any other non-null
    /// payload lands under a `data` key.
    pub fn new(result: impl Into<String>, status: StatusCode, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        Self {
            result: result.into(),
            status,
            payload,
        }
    }

    /// `success` / 200.
    pub fn success(payload: Value) -> Self {
        Self::new(RESULT_SUCCESS, StatusCode::OK, payload)
    }

    /// `validation-error` / 422 with a structured issue list and a
    /// human-readable summary message.
    pub fn validation_error(issues: Vec<Issue>) -> Self {
        let mut payload = Map::new();
        payload.insert(
            "message".to_string(),
            Value::String(
                "We found some incorrect field(s) during validating the form.".to_string(),
            ),
        );
        payload.insert(
            "issues".to_string(),
            serde_json::to_value(issues).unwrap_or(Value::Array(Vec::new())),
        );
        Self {
            result: RESULT_VALIDATION_ERROR.to_string(),
            status: StatusCode::UNPROCESSABLE_ENTITY,
            payload,
        }
    }

    /// `unexpected-error` / 500 with a generic message.
    pub fn unexpected_error() -> Self {
        let mut payload = Map::new();
        payload.insert(
            "message".to_string(),
            Value::String("Something went wrong. Please try again later.".to_string()),
        );
        Self {
            result: RESULT_UNEXPECTED_ERROR.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            payload,
        }
    }

    pub fn result(&self) -> &str {
        &self.result
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn is(&self, result: &str) -> bool {
        self.result == result
    }

    /// The JSON body as sent over the wire: the tag plus the payload fields.
    /// The status code is deliberately absent; it lives on the status line.
    pub fn body_json(&self) -> Value {
        let mut body = Map::with_capacity(self.payload.len() + 1);
        body.insert("result".to_string(), Value::String(self.result.clone()));
        for (key, value) in &self.payload {
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }

    pub fn kind(&self) -> ResponseKind {
        ResponseKind {
            result: self.result.clone(),
            status: self.status,
        }
    }
}

/// One member of the statically declared union of responses an endpoint can
/// produce: a tag and the status it is written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseKind {
    pub result: String,
    pub status: StatusCode,
}

impl ResponseKind {
    pub fn new(result: impl Into<String>, status: StatusCode) -> Self {
        Self {
            result: result.into(),
            status,
        }
    }

    pub fn success() -> Self {
        Self::new(RESULT_SUCCESS, StatusCode::OK)
    }

    pub fn validation_error() -> Self {
        Self::new(RESULT_VALIDATION_ERROR, StatusCode::UNPROCESSABLE_ENTITY)
    }

    pub fn unexpected_error() -> Self {
        Self::new(RESULT_UNEXPECTED_ERROR, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_json_spreads_object_payload_and_omits_status() {
        let resp = ApiResponse::success(json!({"post": {"id": 12}}));
        let body = resp.body_json();
        assert_eq!(body["result"], "success");
        assert_eq!(body["post"]["id"], 12);
        assert!(body.get("statusCode").is_none());
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn non_object_payload_lands_under_data() {
        let resp = ApiResponse::new("listing", StatusCode::OK, json!([1, 2, 3]));
        assert_eq!(resp.body_json()["data"], json!([1, 2, 3]));
    }

    #[test]
    fn validation_error_carries_message_and_issues() {
        let issues = vec![Issue::new(
            "invalid_value",
            "expected a string",
            vec!["user".into(), "name".into()],
        )];
        let resp = ApiResponse::validation_error(issues);
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(resp.is(RESULT_VALIDATION_ERROR));
        let body = resp.body_json();
        assert_eq!(body["issues"][0]["path"], json!(["user", "name"]));
        assert!(body["message"].as_str().unwrap().contains("incorrect"));
    }

    #[test]
    fn unexpected_error_is_500() {
        let resp = ApiResponse::unexpected_error();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.is(RESULT_UNEXPECTED_ERROR));
    }
}
