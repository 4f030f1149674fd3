//! Assembles a [`RequestContext`] from raw axum request parts.

use axum::extract::{RawPathParams, Request};
use axum::response::Response;
use http::{HeaderMap, Method, StatusCode};
use serde_json::{json, Map, Value};

use tandem_core::RequestContext;

use crate::endpoint::into_http;

/// Bodies larger than this are rejected before JSON parsing.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Build the request context for a directly routed endpoint. Returns a ready
/// 400 response when the body cannot be read or is not valid JSON.
pub(crate) async fn context_from_parts(
    method: Method,
    params: RawPathParams,
    request: Request,
) -> Result<RequestContext, Response> {
    let path = request.uri().path().to_string();
    let query = query_value(request.uri().query());
    let headers = headers_value(request.headers());

    let mut param_map = Map::new();
    for (name, value) in params.iter() {
        param_map.insert(name.to_string(), Value::String(value.to_string()));
    }

    let bytes = axum::body::to_bytes(request.into_body(), BODY_LIMIT)
        .await
        .map_err(|_| bad_request("unable to read request body"))?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).map_err(|_| bad_request("request body is not valid JSON"))?
    };

    let mut ctx = RequestContext::new(method, path);
    ctx.body = body;
    ctx.query = query;
    ctx.params = Value::Object(param_map);
    ctx.headers = headers;
    Ok(ctx)
}

/// Decode a query string into a flat JSON object of strings. Repeated keys
/// keep the last value.
pub(crate) fn query_value(raw: Option<&str>) -> Value {
    let mut map = Map::new();
    if let Some(raw) = raw {
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            map.insert(key.into_owned(), Value::String(value.into_owned()));
        }
    }
    Value::Object(map)
}

/// Project transport headers into a JSON object keyed by lowercase name.
/// Non-UTF-8 values are replaced lossily; repeated headers keep the last value.
pub(crate) fn headers_value(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for (name, value) in headers {
        let text = String::from_utf8_lossy(value.as_bytes()).into_owned();
        map.insert(name.as_str().to_string(), Value::String(text));
    }
    Value::Object(map)
}

pub(crate) fn bad_request(message: &str) -> Response {
    into_http(&tandem_core::ApiResponse::new(
        "bad-request",
        StatusCode::BAD_REQUEST,
        json!({ "message": message }),
    ))
}
