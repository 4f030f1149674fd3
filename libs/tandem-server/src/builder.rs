//! Fluent, immutable endpoint builder with compile-time guarantees.
//!
//! This module implements a type-state builder pattern that ensures:
//! - a routable endpoint always has a terminal step (the per-verb finishers
//!   are the only way to obtain an [`Endpoint`]);
//! - [`Endpoint::register`] cannot be called unless a path was set;
//! - partially built chains are plain values: cloning one and extending the
//!   clones never cross-contaminates them;
//! - chain-link data dependencies are checked when links are composed, never
//!   per request.

use std::collections::BTreeSet;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use axum::response::Response;
use http::{Method, StatusCode};

use tandem_core::{
    ApiResponse, Chain, DataToken, FnFinalware, FnStep, Link, Outcome, RequestContext,
    ResponseKind, Schema, SchemaStep, Slot, Step, StepArgs,
};

use crate::endpoint::{
    default_error_handler, Endpoint, ErrorHandler, FnRawFinalware, Terminal,
};

/// Type-state markers for compile-time enforcement.
pub mod state {
    /// Marker for missing required components.
    #[derive(Debug, Clone, Copy)]
    pub struct Missing;

    /// Marker for present required components.
    #[derive(Debug, Clone, Copy)]
    pub struct Present;
}

pub use state::{Missing, Present};

mod sealed {
    pub trait Sealed {}
}

/// Maps the path state to its storage: no slot while missing, the route path
/// once present. Sealed so the state space stays closed.
pub trait PathSlot: sealed::Sealed + Send + Sync + 'static {
    type Slot: Clone + Send + Sync + 'static;
}

impl sealed::Sealed for Missing {}
impl sealed::Sealed for Present {}

impl PathSlot for Missing {
    type Slot = ();
}
impl PathSlot for Present {
    type Slot = String;
}

/// Endpoint builder.
///
/// Generic parameter `P` is the path state (`Missing` | `Present`). Every
/// method consumes the builder and returns a new value layered over the old
/// configuration; clone a partial builder to branch it.
pub struct Builder<P: PathSlot = Missing> {
    chain: Chain,
    path: P::Slot,
    provided: BTreeSet<DataToken>,
    required: BTreeSet<DataToken>,
    responses: Vec<ResponseKind>,
    error_handler: Arc<dyn ErrorHandler>,
    _path_state: PhantomData<P>,
}

impl<P: PathSlot> Clone for Builder<P> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            path: self.path.clone(),
            provided: self.provided.clone(),
            required: self.required.clone(),
            responses: self.responses.clone(),
            error_handler: self.error_handler.clone(),
            _path_state: PhantomData,
        }
    }
}

impl Builder<Missing> {
    pub fn new() -> Self {
        Self {
            chain: Chain::new(),
            path: (),
            provided: BTreeSet::new(),
            required: BTreeSet::new(),
            responses: Vec::new(),
            error_handler: Arc::new(default_error_handler),
            _path_state: PhantomData,
        }
    }

    /// Set the route path. Supports embedded route parameters in either
    /// axum (`/users/{id}`) or colon (`/users/:id`) form.
    pub fn path(self, path: impl Into<String>) -> Builder<Present> {
        Builder {
            chain: self.chain,
            path: path.into(),
            provided: self.provided,
            required: self.required,
            responses: self.responses,
            error_handler: self.error_handler,
            _path_state: PhantomData,
        }
    }
}

impl Default for Builder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PathSlot> Builder<P> {
    /// Append a middleware closure. The closure sees its own copy of the
    /// accumulated data plus the request context, and either proceeds with a
    /// patch or halts with a response.
    pub fn middleware<F, Fut>(mut self, middleware: F) -> Self
    where
        F: Fn(StepArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Outcome>> + Send + 'static,
    {
        self.chain.push(Arc::new(FnStep::new(middleware)));
        self
    }

    /// Append a custom [`Step`] implementation.
    pub fn step(mut self, step: impl Step) -> Self {
        self.chain.push(Arc::new(step));
        self
    }

    /// Validate the request body; the parsed value becomes `data["body"]`.
    pub fn body_schema(self, schema: impl Schema) -> Self {
        self.schema(Slot::Body, schema)
    }

    /// Validate the query string; the parsed value becomes `data["query"]`.
    pub fn query_schema(self, schema: impl Schema) -> Self {
        self.schema(Slot::Query, schema)
    }

    /// Validate route parameters; the parsed value becomes `data["params"]`.
    pub fn params_schema(self, schema: impl Schema) -> Self {
        self.schema(Slot::Params, schema)
    }

    /// Validate request headers; the parsed value becomes `data["headers"]`.
    /// Header names are lowercase.
    pub fn headers_schema(self, schema: impl Schema) -> Self {
        self.schema(Slot::Headers, schema)
    }

    fn schema(mut self, slot: Slot, schema: impl Schema) -> Self {
        self.chain.push(Arc::new(SchemaStep::new(slot, schema)));
        self.provided.insert(slot.token());
        self.declare(ResponseKind::validation_error());
        self
    }

    /// Declare that the steps added so far make `token` available to later
    /// links. Schema steps declare their slot token automatically.
    pub fn provides(mut self, token: DataToken) -> Self {
        self.provided.insert(token);
        self
    }

    /// Declare a halting response the most recent middleware can produce,
    /// extending the endpoint's statically known response union.
    pub fn responds(mut self, result: impl Into<String>, status: StatusCode) -> Self {
        self.declare(ResponseKind::new(result, status));
        self
    }

    /// Declare that this chain assumes `token` is already present when it
    /// starts. Meaningful for chains destined to become links; an endpoint
    /// finalized with an unsatisfied expectation fails at construction time.
    pub fn expect_link(mut self, token: DataToken) -> Self {
        self.required.insert(token);
        self
    }

    /// Splice a previously built [`Link`] into this chain, preserving its
    /// step order and merging its response union.
    ///
    /// # Panics
    ///
    /// Panics at construction time if the link requires tokens that no
    /// earlier step provides and this chain does not itself expect. This is
    /// a startup-time contract failure, never a per-request check.
    pub fn chain(mut self, link: &Link) -> Self {
        let missing: Vec<&DataToken> = link
            .requires()
            .iter()
            .filter(|token| !self.provided.contains(token) && !self.required.contains(token))
            .collect();
        if !missing.is_empty() {
            let missing = missing
                .iter()
                .map(|t| t.0)
                .collect::<Vec<_>>()
                .join(", ");
            panic!("chain(): link requires data not provided earlier in the chain: {missing}");
        }
        self.provided.extend(link.provides().iter().copied());
        for kind in link.responses() {
            self.declare(kind.clone());
        }
        self.chain.push(Arc::new(link.clone()));
        self
    }

    /// Inject the error handler used when a step, terminal, or validator
    /// faults. Defaults to logging plus a generic `unexpected-error`.
    pub fn on_error<H>(mut self, handler: H) -> Self
    where
        H: ErrorHandler,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Finalize as a reusable chain link (no HTTP binding, no terminal).
    pub fn build_link(self) -> Link {
        Link::new(self.chain, self.required, self.provided, self.responses)
    }

    /// Finalize as GET. The handler returns the endpoint's JSON response.
    pub fn get<F, Fut>(self, handler: F) -> Endpoint<P>
    where
        F: Fn(StepArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ApiResponse>> + Send + 'static,
    {
        self.enveloped(Method::GET, handler)
    }

    /// Finalize as POST. The handler returns the endpoint's JSON response.
    pub fn post<F, Fut>(self, handler: F) -> Endpoint<P>
    where
        F: Fn(StepArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ApiResponse>> + Send + 'static,
    {
        self.enveloped(Method::POST, handler)
    }

    /// Finalize as PUT. The handler returns the endpoint's JSON response.
    pub fn put<F, Fut>(self, handler: F) -> Endpoint<P>
    where
        F: Fn(StepArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ApiResponse>> + Send + 'static,
    {
        self.enveloped(Method::PUT, handler)
    }

    /// Finalize as PATCH. The handler returns the endpoint's JSON response.
    pub fn patch<F, Fut>(self, handler: F) -> Endpoint<P>
    where
        F: Fn(StepArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ApiResponse>> + Send + 'static,
    {
        self.enveloped(Method::PATCH, handler)
    }

    /// Finalize as DELETE. The handler returns the endpoint's JSON response.
    pub fn delete<F, Fut>(self, handler: F) -> Endpoint<P>
    where
        F: Fn(StepArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ApiResponse>> + Send + 'static,
    {
        self.enveloped(Method::DELETE, handler)
    }

    /// Finalize as GET with a raw terminal that writes the transport
    /// response itself (streaming, plain text, custom headers). The chain
    /// still runs first: the raw handler receives the full [`Outcome`],
    /// halts included, and the standard envelope serialization is skipped.
    pub fn get_raw<F, Fut>(self, handler: F) -> Endpoint<P>
    where
        F: Fn(Outcome, Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.raw(Method::GET, handler)
    }

    /// Finalize as POST with a raw terminal. See [`Builder::get_raw`].
    pub fn post_raw<F, Fut>(self, handler: F) -> Endpoint<P>
    where
        F: Fn(Outcome, Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.raw(Method::POST, handler)
    }

    /// Finalize as PUT with a raw terminal. See [`Builder::get_raw`].
    pub fn put_raw<F, Fut>(self, handler: F) -> Endpoint<P>
    where
        F: Fn(Outcome, Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.raw(Method::PUT, handler)
    }

    /// Finalize as PATCH with a raw terminal. See [`Builder::get_raw`].
    pub fn patch_raw<F, Fut>(self, handler: F) -> Endpoint<P>
    where
        F: Fn(Outcome, Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.raw(Method::PATCH, handler)
    }

    /// Finalize as DELETE with a raw terminal. See [`Builder::get_raw`].
    pub fn delete_raw<F, Fut>(self, handler: F) -> Endpoint<P>
    where
        F: Fn(Outcome, Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.raw(Method::DELETE, handler)
    }

    fn enveloped<F, Fut>(self, method: Method, handler: F) -> Endpoint<P>
    where
        F: Fn(StepArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ApiResponse>> + Send + 'static,
    {
        self.finalize(
            method,
            Terminal::Enveloped(Arc::new(FnFinalware::new(handler))),
        )
    }

    fn raw<F, Fut>(self, method: Method, handler: F) -> Endpoint<P>
    where
        F: Fn(Outcome, Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Response>> + Send + 'static,
    {
        self.finalize(method, Terminal::Raw(Arc::new(FnRawFinalware::new(handler))))
    }

    fn finalize(mut self, method: Method, terminal: Terminal) -> Endpoint<P> {
        let unmet: Vec<&'static str> = self
            .required
            .iter()
            .filter(|token| !self.provided.contains(token))
            .map(|token| token.0)
            .collect();
        if !unmet.is_empty() {
            panic!(
                "endpoint finalized with unmet chain expectations: {}",
                unmet.join(", ")
            );
        }
        self.declare(ResponseKind::unexpected_error());
        Endpoint::new(
            method,
            self.path,
            self.chain,
            terminal,
            self.responses,
            self.error_handler,
        )
    }

    fn declare(&mut self, kind: ResponseKind) {
        if !self.responses.contains(&kind) {
            self.responses.push(kind);
        }
    }
}
