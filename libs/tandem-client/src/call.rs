//! Per-call builder: segment path, cancellation, verb dispatch.

use http::Method;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use tandem_core::{carries_in_query, Argument, Envelope, DATA_QUERY_KEY};

use crate::client::Client;
use crate::reply::{CallReply, ClientError};

/// Builds one wire call. Obtained from [`Client::call`]; consumed by a verb
/// method.
pub struct CallBuilder {
    client: Client,
    segments: Vec<String>,
    abort: Option<CancellationToken>,
}

impl CallBuilder {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            segments: Vec::new(),
            abort: None,
        }
    }

    /// Append one route segment.
    pub fn segment(mut self, name: impl Into<String>) -> Self {
        self.segments.push(name.into());
        self
    }

    /// Append several route segments at once.
    pub fn segments<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.segments.extend(names.into_iter().map(Into::into));
        self
    }

    /// Abandon the call when `token` is cancelled, whether the call is still
    /// connecting or already streaming the reply body. The call then fails
    /// with [`ClientError::Aborted`]; see `ReplyResultExt::or_abort` for
    /// folding that into the reply space.
    pub fn abort_on(mut self, token: CancellationToken) -> Self {
        self.abort = Some(token);
        self
    }

    pub async fn get(self, argument: Argument) -> Result<CallReply, ClientError> {
        self.send(Method::GET, argument).await
    }

    pub async fn post(self, argument: Argument) -> Result<CallReply, ClientError> {
        self.send(Method::POST, argument).await
    }

    pub async fn put(self, argument: Argument) -> Result<CallReply, ClientError> {
        self.send(Method::PUT, argument).await
    }

    pub async fn patch(self, argument: Argument) -> Result<CallReply, ClientError> {
        self.send(Method::PATCH, argument).await
    }

    pub async fn delete(self, argument: Argument) -> Result<CallReply, ClientError> {
        self.send(Method::DELETE, argument).await
    }

    async fn send(self, method: Method, argument: Argument) -> Result<CallReply, ClientError> {
        let preloaded = match &self.client.preloader {
            // run per call so short-lived values (tokens) stay fresh
            Some(loader) => loader().await,
            None => Argument::new(),
        };
        let mut argument = argument.overlaid_on(preloaded);
        // headers ride the transport, not the envelope
        let headers = argument.headers.take();

        let envelope = Envelope::new(self.segments, argument);
        let data = serde_json::to_string(&envelope).map_err(ClientError::Envelope)?;

        let mut request = if carries_in_query(&method) {
            let url = format!(
                "{}?{}={}",
                self.client.url,
                DATA_QUERY_KEY,
                urlencoding::encode(&data)
            );
            self.client.http.request(method.clone(), url)
        } else {
            self.client
                .http
                .request(method.clone(), &self.client.url)
                .body(data)
        };
        request = request
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::ACCEPT, "application/json");
        if let Some(Value::Object(extra)) = headers {
            for (name, value) in extra {
                let text = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                request = request.header(name, text);
            }
        }

        tracing::debug!(method = %method, segments = ?envelope.segments, "sending wire call");
        // the token covers the whole exchange, body streaming included
        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let bytes = response.bytes().await?;
            let body: Value = serde_json::from_slice(&bytes).map_err(ClientError::Decode)?;
            Ok(CallReply::from_wire(status, body))
        };
        match &self.abort {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(ClientError::Aborted),
                reply = exchange => reply,
            },
            None => exchange.await,
        }
    }
}
