//! A custom AWS Lambda runtime.
//!
//! The runtime polls the Runtime API for one invocation at a time, passes the event and
//! the [`Context`] to a [`Handler`] and reports the outcome before polling again.
//!
//! Inside Lambda (AWS_LAMBDA_RUNTIME_API is set) it talks HTTP to the host. Anywhere else
//! it runs a single invocation with the event from LAMBDA_EVENT or ./test/event.json and
//! logs the result, which is handy for testing in docker.
//!
//! ```no_run
//! use lambda_custom_runtime::{handler_fn, BoxError, Context, Document};
//! use serde_json::{json, Value};
//!
//! fn handler(_ctx: &Context, event: Document) -> Result<Value, BoxError> {
//!     Ok(json!({ "result": event.get("key1") }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     lambda_custom_runtime::init_tracing();
//!     lambda_custom_runtime::run(handler_fn(handler)).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod handler;
mod logging;
pub mod runtime;

pub use api::{Invocation, RuntimeApi, RuntimeClient};
pub use config::{FunctionConfig, RetryPolicy};
pub use context::Context;
pub use document::Document;
pub use error::{BoxError, RuntimeError, RuntimeResult};
pub use handler::{async_handler_fn, callback_fn, handler_fn, Completion, Handler};
pub use logging::init_tracing;
pub use runtime::{run, Runtime, State, StopReason};
