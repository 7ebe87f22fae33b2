//! Runtime API paths, see https://docs.aws.amazon.com/lambda/latest/dg/runtimes-api.html

pub const API_VERSION: &str = "2018-06-01";

/// GET, long-polls for the next invocation
pub fn next_invocation() -> String {
    format!("/{API_VERSION}/runtime/invocation/next")
}

/// POST, the handler succeeded
pub fn invocation_response(request_id: &str) -> String {
    format!("/{API_VERSION}/runtime/invocation/{request_id}/response")
}

/// POST, the handler failed
pub fn invocation_error(request_id: &str) -> String {
    format!("/{API_VERSION}/runtime/invocation/{request_id}/error")
}

/// POST, the runtime could not start
pub fn init_error() -> String {
    format!("/{API_VERSION}/runtime/init/error")
}
