//! Wire dispatch: one physical HTTP endpoint serving a whole route tree.
//!
//! Every call arrives at the mount path carrying an [`Envelope`] that names
//! the target by route segments and supplies the argument slots. GET and
//! DELETE calls carry the envelope JSON in the `data` query parameter; other
//! verbs carry it as the request body.

use std::sync::Arc;

use axum::extract::Request;
use axum::response::Response;
use axum::{routing, Router};
use http::Method;
use serde_json::{Map, Value};

use tandem_core::{carries_in_query, Envelope, RequestContext, DATA_QUERY_KEY};

use crate::extract;
use crate::routes::Routes;

/// Mount `routes` behind a single physical route at `path`, listening on all
/// five supported verbs. The envelope's declared verb must still match the
/// target endpoint's bound verb.
pub fn mount<S>(router: Router<S>, path: &str, routes: Routes) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let routes = Arc::new(routes);
    let handler = move |request: Request| {
        let routes = routes.clone();
        async move { dispatch(routes, request).await }
    };
    tracing::debug!(path, "mounting wire dispatcher");
    router.route(
        path,
        routing::get(handler.clone())
            .post(handler.clone())
            .put(handler.clone())
            .patch(handler.clone())
            .delete(handler),
    )
}

async fn dispatch(routes: Arc<Routes>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let transport_headers = extract::headers_value(request.headers());

    let envelope = match read_envelope(&method, request).await {
        Ok(envelope) => envelope,
        Err(rejection) => return rejection,
    };

    let Some(leaf) = routes.resolve(&envelope.segments) else {
        tracing::debug!(segments = ?envelope.segments, "no endpoint at segment path");
        return extract::bad_request("Method not allowed");
    };
    if leaf.method != method {
        tracing::debug!(
            segments = ?envelope.segments,
            requested = %method,
            bound = %leaf.method,
            "verb mismatch on wire call"
        );
        return extract::bad_request("Method not allowed");
    }

    let argument = envelope.argument;
    let mut ctx = RequestContext::new(method, path);
    ctx.body = argument.body.unwrap_or(Value::Null);
    ctx.query = argument.query.unwrap_or_else(empty_object);
    ctx.params = argument.params.unwrap_or_else(empty_object);
    ctx.headers = overlay_headers(transport_headers, argument.headers);

    leaf.handle(Arc::new(ctx)).await
}

async fn read_envelope(method: &Method, request: Request) -> Result<Envelope, Response> {
    if carries_in_query(method) {
        let raw = request.uri().query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == DATA_QUERY_KEY)
                .map(|(_, value)| value.into_owned())
        });
        let Some(raw) = raw else {
            return Err(extract::bad_request("missing `data` query parameter"));
        };
        serde_json::from_str(&raw).map_err(|_| extract::bad_request("malformed wire envelope"))
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), ENVELOPE_LIMIT)
            .await
            .map_err(|_| extract::bad_request("unable to read request body"))?;
        serde_json::from_slice(&bytes).map_err(|_| extract::bad_request("malformed wire envelope"))
    }
}

const ENVELOPE_LIMIT: usize = 2 * 1024 * 1024;

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Overlay envelope-supplied headers onto the transport headers. Names are
/// lowercased so the context's lowercase contract holds either way.
fn overlay_headers(transport: Value, extra: Option<Value>) -> Value {
    let Some(Value::Object(extra)) = extra else {
        return transport;
    };
    let mut merged = match transport {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (name, value) in extra {
        merged.insert(name.to_lowercase(), value);
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_headers_override_transport_headers_lowercased() {
        let transport = json!({"authorization": "Bearer stale", "accept": "application/json"});
        let merged = overlay_headers(
            transport,
            Some(json!({"Authorization": "Bearer fresh", "x-extra": "1"})),
        );
        assert_eq!(merged["authorization"], "Bearer fresh");
        assert_eq!(merged["accept"], "application/json");
        assert_eq!(merged["x-extra"], "1");
    }

    #[test]
    fn absent_extra_headers_keep_transport_headers() {
        let transport = json!({"accept": "application/json"});
        assert_eq!(overlay_headers(transport.clone(), None), transport);
    }
}
