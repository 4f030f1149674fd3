//! Client handle: base URL, shared HTTP pool, optional argument preloader.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use tandem_core::Argument;

use crate::call::CallBuilder;

pub(crate) type Preloader = dyn Fn() -> BoxFuture<'static, Argument> + Send + Sync;

/// Handle for calling wire endpoints mounted at one dispatch URL.
///
/// Cloning is cheap and shares the underlying connection pool. A client is
/// immutable; [`Client::with`] derives a new one rather than mutating.
#[derive(Clone)]
pub struct Client {
    pub(crate) url: String,
    pub(crate) http: reqwest::Client,
    pub(crate) preloader: Option<Arc<Preloader>>,
}

impl Client {
    /// Point a client at the wire dispatch URL, e.g.
    /// `http://localhost:3000/rpc`.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_http(url, reqwest::Client::new())
    }

    /// Same as [`Client::new`] with a caller-configured [`reqwest::Client`]
    /// (timeouts, proxies, TLS settings).
    pub fn with_http(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
            preloader: None,
        }
    }

    /// Derive a client whose calls run `loader` first and use its argument
    /// as a base layer: explicit call arguments win per slot. Typical use is
    /// attaching a fresh auth header to every call.
    pub fn with<F, Fut>(&self, loader: F) -> Client
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Argument> + Send + 'static,
    {
        Client {
            url: self.url.clone(),
            http: self.http.clone(),
            preloader: Some(Arc::new(move || loader().boxed())),
        }
    }

    /// Start addressing an endpoint by route segments.
    pub fn call(&self) -> CallBuilder {
        CallBuilder::new(self.clone())
    }
}
