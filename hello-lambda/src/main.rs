/// A basic lambda for testing the custom runtime locally and on AWS.
/// Run it locally with `LAMBDA_EVENT='{"key1":"abc"}' cargo run -p hello-lambda`.
use lambda_custom_runtime::{handler_fn, BoxError, Context, Document};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

#[derive(Serialize, Debug, PartialEq)]
struct Response {
    result: Value,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    lambda_custom_runtime::init_tracing();

    lambda_custom_runtime::run(handler_fn(my_handler)).await?;

    Ok(())
}

pub(crate) fn my_handler(ctx: &Context, event: Document) -> Result<Response, BoxError> {
    info!("Handler invoked: {}", ctx.request_id);

    let result = event
        .get("key1")
        .cloned()
        .unwrap_or_else(|| Value::from("unknown key : key1"));

    Ok(Response { result })
}
