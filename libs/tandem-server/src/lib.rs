//! Server side of tandem: type-safe endpoint chains over axum.
//!
//! The builder composes validation and middleware steps into an immutable
//! chain, binds it to a verb, and yields an [`Endpoint`] that either
//! registers directly on an axum [`axum::Router`] or mounts into a
//! segment-addressed route tree behind a single wire dispatcher.
//!
//! ```no_run
//! use axum::Router;
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//! use tandem_server::{typed, ApiResponse, Builder};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct NewUser {
//!     name: String,
//! }
//!
//! let create_user = Builder::new()
//!     .path("/users")
//!     .body_schema(typed::<NewUser>())
//!     .post(|args| async move {
//!         let name = args.field("body").and_then(|b| b.get("name")).cloned();
//!         Ok(ApiResponse::success(json!({ "created": name })))
//!     });
//!
//! let app: Router = create_user.register(Router::new());
//! ```

pub mod builder;
pub mod endpoint;
mod extract;
pub mod routes;
pub mod rpc;

pub use builder::{Builder, Missing, PathSlot, Present};
pub use endpoint::{default_error_handler, Endpoint, ErrorHandler, RawFinalware};
pub use routes::Routes;
pub use rpc::mount;

pub use tandem_core::{
    carries_in_query, typed, ApiResponse, Argument, Chain, DataToken, Envelope, Finalware, Issue,
    JsonObject, Link, Outcome, RequestContext, ResponseKind, Schema, SchemaError, SchemaStep, Slot,
    Step, StepArgs, TypedSchema, DATA_QUERY_KEY,
};
