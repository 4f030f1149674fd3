//! # tandem-core
//!
//! Transport-agnostic core of the tandem endpoint chain engine.
//!
//! An endpoint is an ordered chain of [`Step`]s followed by one terminal
//! handler. Every step consumes the data accumulated so far and either
//! proceeds with a patch of new fields or halts the whole chain with a
//! tagged [`ApiResponse`]. Chains without a terminal can be built into
//! reusable [`Link`]s and spliced into other chains.
//!
//! This crate knows nothing about HTTP servers or clients; the axum binding
//! lives in `tandem-server` and the caller in `tandem-client`. Both sides
//! share the [`wire`] envelope defined here.

pub mod chain;
pub mod context;
pub mod response;
pub mod schema;
pub mod step;
pub mod wire;

pub use chain::{Chain, DataToken, Link, SchemaStep};
pub use context::{RequestContext, Slot};
pub use response::{
    ApiResponse, ResponseKind, RESULT_SUCCESS, RESULT_UNEXPECTED_ERROR, RESULT_VALIDATION_ERROR,
};
pub use schema::{typed, Issue, Schema, SchemaError, TypedSchema};
pub use step::{Finalware, FnFinalware, FnStep, JsonObject, Outcome, Step, StepArgs};
pub use wire::{carries_in_query, Argument, Envelope, DATA_QUERY_KEY};
