//! Finalized endpoints: per-request execution and router registration.

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{RawPathParams, Request};
use axum::response::{IntoResponse, Response};
use axum::{routing, Router};
use futures::FutureExt;
use http::Method;

use tandem_core::{
    ApiResponse, Chain, Finalware, Outcome, RequestContext, ResponseKind, StepArgs,
};

use crate::builder::{PathSlot, Present};
use crate::extract;

/// Handles faults raised by steps, validators, and terminals. The returned
/// response is written to the caller in place of the chain's outcome.
///
/// Plain functions and closures of the matching shape implement this trait.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(&self, error: &anyhow::Error, ctx: &RequestContext) -> ApiResponse;
}

impl<F> ErrorHandler for F
where
    F: Fn(&anyhow::Error, &RequestContext) -> ApiResponse + Send + Sync + 'static,
{
    fn handle(&self, error: &anyhow::Error, ctx: &RequestContext) -> ApiResponse {
        self(error, ctx)
    }
}

/// Fallback error handler: a generic `unexpected-error` with no detail from
/// the fault, so internals never leak to callers.
pub fn default_error_handler(_error: &anyhow::Error, _ctx: &RequestContext) -> ApiResponse {
    ApiResponse::unexpected_error()
}

/// Terminal that writes the transport response itself instead of the
/// standard envelope. It receives the chain outcome as-is, halts included.
#[async_trait]
pub trait RawFinalware: Send + Sync + 'static {
    async fn finish(&self, outcome: Outcome, ctx: Arc<RequestContext>) -> anyhow::Result<Response>;
}

/// Adapter turning an async closure into a [`RawFinalware`].
pub struct FnRawFinalware<F> {
    f: F,
}

impl<F> FnRawFinalware<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> RawFinalware for FnRawFinalware<F>
where
    F: Fn(Outcome, Arc<RequestContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
{
    async fn finish(&self, outcome: Outcome, ctx: Arc<RequestContext>) -> anyhow::Result<Response> {
        (self.f)(outcome, ctx).await
    }
}

pub(crate) enum Terminal {
    Enveloped(Arc<dyn Finalware>),
    Raw(Arc<dyn RawFinalware>),
}

pub(crate) struct EndpointInner {
    pub(crate) method: Method,
    chain: Chain,
    terminal: Terminal,
    responses: Vec<ResponseKind>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl EndpointInner {
    /// Run the chain and terminal for one request. Never returns an error:
    /// faults and panics are converted through the error handler.
    pub(crate) async fn handle(&self, ctx: Arc<RequestContext>) -> Response {
        let run = async {
            let outcome = self.chain.run(ctx.clone()).await?;
            match (&self.terminal, outcome) {
                (Terminal::Raw(raw), outcome) => raw.finish(outcome, ctx.clone()).await,
                (Terminal::Enveloped(_), Outcome::Halt(response)) => Ok(into_http(&response)),
                (Terminal::Enveloped(finalware), Outcome::Proceed(data)) => {
                    let args = StepArgs {
                        data,
                        ctx: ctx.clone(),
                    };
                    Ok(into_http(&finalware.finish(args).await?))
                }
            }
        };
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => self.fault(&error, &ctx),
            Err(panic) => {
                let error = anyhow::anyhow!("step panicked: {}", panic_text(panic.as_ref()));
                self.fault(&error, &ctx)
            }
        }
    }

    fn fault(&self, error: &anyhow::Error, ctx: &RequestContext) -> Response {
        tracing::error!(
            method = %self.method,
            path = %ctx.path,
            error = format!("{error:#}"),
            "request handling fault"
        );
        let handled =
            std::panic::catch_unwind(AssertUnwindSafe(|| self.error_handler.handle(error, ctx)));
        let response = match handled {
            Ok(response) => response,
            Err(_) => {
                tracing::error!("injected error handler panicked; falling back to the default");
                default_error_handler(error, ctx)
            }
        };
        into_http(&response)
    }
}

fn panic_text(panic: &(dyn Any + Send)) -> &str {
    if let Some(text) = panic.downcast_ref::<&str>() {
        text
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text
    } else {
        "non-string panic payload"
    }
}

/// Serialize an [`ApiResponse`] onto the transport: the status goes on the
/// status line, the body is `{"result": tag, ...payload}`.
pub(crate) fn into_http(response: &ApiResponse) -> Response {
    (response.status(), axum::Json(response.body_json())).into_response()
}

/// A finalized endpoint bound to one HTTP verb.
///
/// `register` is only available once a path was set; pathless endpoints are
/// still fully executable through the wire dispatcher (see [`crate::rpc`]).
pub struct Endpoint<P: PathSlot = Present> {
    inner: Arc<EndpointInner>,
    path: P::Slot,
    _path_state: PhantomData<P>,
}

impl<P: PathSlot> Clone for Endpoint<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            path: self.path.clone(),
            _path_state: PhantomData,
        }
    }
}

impl<P: PathSlot> Endpoint<P> {
    pub(crate) fn new(
        method: Method,
        path: P::Slot,
        chain: Chain,
        terminal: Terminal,
        responses: Vec<ResponseKind>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Self {
        Self {
            inner: Arc::new(EndpointInner {
                method,
                chain,
                terminal,
                responses,
                error_handler,
            }),
            path,
            _path_state: PhantomData,
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// The statically declared union of responses this endpoint can produce.
    pub fn responses(&self) -> &[ResponseKind] {
        &self.inner.responses
    }

    /// Execute the endpoint against an already assembled context. Intended
    /// for tests and embedding outside an axum router.
    pub async fn handle(&self, ctx: RequestContext) -> Response {
        self.inner.handle(Arc::new(ctx)).await
    }

    pub(crate) fn inner(&self) -> Arc<EndpointInner> {
        self.inner.clone()
    }
}

impl Endpoint<Present> {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Register this endpoint on an axum router under its own path and verb.
    pub fn register<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let path = normalize_path(&self.path);
        let inner = self.inner.clone();
        let handler = move |params: RawPathParams, request: Request| {
            let inner = inner.clone();
            async move {
                let ctx = match extract::context_from_parts(inner.method.clone(), params, request)
                    .await
                {
                    Ok(ctx) => ctx,
                    Err(rejection) => return rejection,
                };
                inner.handle(Arc::new(ctx)).await
            }
        };
        tracing::debug!(method = %self.inner.method, path = %path, "registering endpoint");
        let route = match self.inner.method {
            Method::GET => routing::get(handler),
            Method::POST => routing::post(handler),
            Method::PUT => routing::put(handler),
            Method::PATCH => routing::patch(handler),
            Method::DELETE => routing::delete(handler),
            _ => routing::any(handler),
        };
        router.route(&path, route)
    }
}

/// Rewrite colon-style route parameters (`/users/:id`) into the brace form
/// axum 0.8 expects (`/users/{id}`). Brace-form paths pass through untouched.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}
