//! The contract every chain step satisfies.
//!
//! A step consumes the accumulated data and either proceeds with a patch of
//! new fields or halts the chain with a response. Both the continuation flag
//! and the halt status are carried by [`Outcome`], so a "malformed step"
//! (missing flag, halt without a status) cannot be expressed at all; the
//! construction-time half of that contract lives in the server builder.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RequestContext;
use crate::response::ApiResponse;

/// Accumulated chain data: field name to JSON value.
pub type JsonObject = serde_json::Map<String, Value>;

/// What a step decided.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Continue the chain; the patch is shallow-merged into the accumulated
    /// data (later fields win over earlier ones with the same name).
    Proceed(JsonObject),
    /// Stop the chain; no later step or terminal runs.
    Halt(ApiResponse),
}

impl Outcome {
    /// Continue without contributing any data.
    pub fn proceed_empty() -> Self {
        Outcome::Proceed(JsonObject::new())
    }

    /// Continue with an object patch. Non-object values contribute nothing.
    pub fn proceed_with(patch: Value) -> Self {
        match patch {
            Value::Object(map) => Outcome::Proceed(map),
            _ => Outcome::proceed_empty(),
        }
    }

    pub fn is_halt(&self) -> bool {
        matches!(self, Outcome::Halt(_))
    }
}

/// What a step gets to look at: its own copy of the accumulated data and the
/// shared request context.
pub struct StepArgs {
    pub data: JsonObject,
    pub ctx: Arc<RequestContext>,
}

impl StepArgs {
    /// Convenience accessor into the accumulated data.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// One unit of chain execution.
///
/// Steps are immutable once added to a chain and may be shared across many
/// concurrent requests; a returned `Err` is an unexpected fault routed to the
/// endpoint's error handler, never a validation failure.
#[async_trait]
pub trait Step: Send + Sync + 'static {
    async fn run(&self, args: StepArgs) -> anyhow::Result<Outcome>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "step"
    }
}

/// Adapter turning an async closure into a [`Step`].
pub struct FnStep<F> {
    f: F,
}

impl<F> FnStep<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Step for FnStep<F>
where
    F: Fn(StepArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Outcome>> + Send + 'static,
{
    async fn run(&self, args: StepArgs) -> anyhow::Result<Outcome> {
        (self.f)(args).await
    }

    fn name(&self) -> &str {
        "middleware"
    }
}

/// The terminal step: sees the fully accumulated data of a chain that never
/// halted and produces the endpoint's business response.
#[async_trait]
pub trait Finalware: Send + Sync + 'static {
    async fn finish(&self, args: StepArgs) -> anyhow::Result<ApiResponse>;
}

/// Adapter turning an async closure into a [`Finalware`].
pub struct FnFinalware<F> {
    f: F,
}

impl<F> FnFinalware<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Finalware for FnFinalware<F>
where
    F: Fn(StepArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ApiResponse>> + Send + 'static,
{
    async fn finish(&self, args: StepArgs) -> anyhow::Result<ApiResponse> {
        (self.f)(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn fn_step_runs_the_closure() {
        let step = FnStep::new(|args: StepArgs| async move {
            let mut patch = JsonObject::new();
            patch.insert("path".to_string(), json!(args.ctx.path));
            Ok(Outcome::Proceed(patch))
        });
        let args = StepArgs {
            data: JsonObject::new(),
            ctx: Arc::new(RequestContext::new(Method::GET, "/ping")),
        };
        match step.run(args).await.unwrap() {
            Outcome::Proceed(patch) => assert_eq!(patch["path"], "/ping"),
            Outcome::Halt(r) => panic!("unexpected halt: {}", r.result()),
        }
    }

    #[test]
    fn proceed_with_ignores_non_objects() {
        assert!(matches!(
            Outcome::proceed_with(json!("nope")),
            Outcome::Proceed(map) if map.is_empty()
        ));
    }
}
