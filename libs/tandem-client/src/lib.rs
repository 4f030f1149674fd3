//! Client side of tandem: call wire endpoints by route segments.
//!
//! ```no_run
//! use serde_json::json;
//! use tandem_client::{Argument, Client, ReplyResultExt};
//!
//! # async fn demo() -> Result<(), tandem_client::ClientError> {
//! let client = Client::new("http://localhost:3000/rpc")
//!     .with(|| async { Argument::new().headers(json!({ "authorization": "Bearer t" })) });
//!
//! let user = client
//!     .call()
//!     .segment("user")
//!     .segment("get")
//!     .get(Argument::new().query(json!({ "id": 12 })))
//!     .await
//!     .expect_success()?;
//! println!("{:?}", user.field("name"));
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod client;
pub mod reply;

pub use call::CallBuilder;
pub use client::Client;
pub use reply::{CallReply, ClientError, ReplyResultExt, RESULT_ABORT};

pub use tandem_core::{Argument, Envelope};
pub use tokio_util::sync::CancellationToken;
