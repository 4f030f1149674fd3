//! Sequential chain execution, schema steps, and reusable links.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::Slot;
use crate::response::{ApiResponse, ResponseKind};
use crate::schema::{Schema, SchemaError};
use crate::step::{JsonObject, Outcome, Step, StepArgs};

/// Name of a piece of accumulated data a step provides or a link requires.
///
/// Tokens are the construction-time dependency registry: a link that requires
/// a token can only be chained after something that provides it. They are
/// never consulted per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataToken(pub &'static str);

impl fmt::Display for DataToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Slot {
    /// The token a schema step for this slot provides.
    pub const fn token(self) -> DataToken {
        DataToken(self.as_str())
    }
}

/// Shallow merge: every patch field overwrites an existing field of the same
/// name (last write wins); unrelated fields are untouched.
pub fn merge_into(data: &mut JsonObject, patch: JsonObject) {
    for (key, value) in patch {
        data.insert(key, value);
    }
}

/// An ordered sequence of steps without a terminal.
#[derive(Clone, Default)]
pub struct Chain {
    steps: Vec<Arc<dyn Step>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Arc<dyn Step>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order against an empty accumulated object.
    pub async fn run(&self, ctx: Arc<crate::context::RequestContext>) -> anyhow::Result<Outcome> {
        self.run_from(JsonObject::new(), ctx).await
    }

    /// Run every step in order, starting from already accumulated data.
    ///
    /// Steps execute strictly sequentially; the first halting step wins and
    /// nothing after it runs. A fully proceeding chain yields the merged data
    /// of every step.
    pub async fn run_from(
        &self,
        data: JsonObject,
        ctx: Arc<crate::context::RequestContext>,
    ) -> anyhow::Result<Outcome> {
        let mut data = data;
        for step in &self.steps {
            let args = StepArgs {
                data: data.clone(),
                ctx: ctx.clone(),
            };
            match step.run(args).await? {
                Outcome::Proceed(patch) => merge_into(&mut data, patch),
                Outcome::Halt(response) => {
                    tracing::debug!(
                        step = step.name(),
                        result = response.result(),
                        status = response.status().as_u16(),
                        "chain halted"
                    );
                    return Ok(Outcome::Halt(response));
                }
            }
        }
        Ok(Outcome::Proceed(data))
    }
}

/// Step that validates one request slot against a schema.
///
/// On success the parsed value is stored under the slot's name; if an earlier
/// step already validated the same slot and both values are objects, the new
/// fields are shallow-merged over the old ones, so several schema steps can
/// incrementally enrich one slot. Validation failures halt with a 422; a
/// crash inside the schema propagates as a fault.
pub struct SchemaStep {
    slot: Slot,
    schema: Arc<dyn Schema>,
}

impl SchemaStep {
    pub fn new(slot: Slot, schema: impl Schema) -> Self {
        Self {
            slot,
            schema: Arc::new(schema),
        }
    }
}

#[async_trait]
impl Step for SchemaStep {
    async fn run(&self, args: StepArgs) -> anyhow::Result<Outcome> {
        match self.schema.parse(args.ctx.slot(self.slot)) {
            Ok(mut parsed) => {
                let existing = args
                    .data
                    .get(self.slot.as_str())
                    .and_then(Value::as_object);
                if let (Some(existing), Some(new_fields)) = (existing, parsed.as_object()) {
                    let mut merged = existing.clone();
                    for (key, value) in new_fields {
                        merged.insert(key.clone(), value.clone());
                    }
                    parsed = Value::Object(merged);
                }
                let mut patch = JsonObject::new();
                patch.insert(self.slot.as_str().to_string(), parsed);
                Ok(Outcome::Proceed(patch))
            }
            Err(SchemaError::Invalid(issues)) => {
                Ok(Outcome::Halt(ApiResponse::validation_error(issues)))
            }
            Err(SchemaError::Fault(err)) => Err(err),
        }
    }

    fn name(&self) -> &str {
        self.slot.as_str()
    }
}

/// A terminal-less chain packaged as one composite step, plus the dependency
/// tokens and response kinds it carries.
///
/// Links are immutable and stateless across uses: the same link can be
/// spliced into any number of parent chains without cross-contamination.
#[derive(Clone, Default)]
pub struct Link {
    chain: Chain,
    requires: BTreeSet<DataToken>,
    provides: BTreeSet<DataToken>,
    responses: Vec<ResponseKind>,
}

impl Link {
    pub fn new(
        chain: Chain,
        requires: BTreeSet<DataToken>,
        provides: BTreeSet<DataToken>,
        responses: Vec<ResponseKind>,
    ) -> Self {
        Self {
            chain,
            requires,
            provides,
            responses,
        }
    }

    /// Tokens this link assumes are already present when it starts.
    pub fn requires(&self) -> &BTreeSet<DataToken> {
        &self.requires
    }

    /// Tokens this link's own steps contribute.
    pub fn provides(&self) -> &BTreeSet<DataToken> {
        &self.provides
    }

    /// Halting responses any of this link's steps can produce.
    pub fn responses(&self) -> &[ResponseKind] {
        &self.responses
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[async_trait]
impl Step for Link {
    async fn run(&self, args: StepArgs) -> anyhow::Result<Outcome> {
        self.chain.run_from(args.data, args.ctx).await
    }

    fn name(&self) -> &str {
        "link"
    }
}
