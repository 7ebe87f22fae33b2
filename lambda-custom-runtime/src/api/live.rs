use super::{paths, Invocation, RuntimeApi};
use crate::document;
use crate::error::{RuntimeError, RuntimeResult};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::fmt;
use tracing::{debug, warn};

/// Sent with error reports so the host can classify the failure.
pub const ERROR_TYPE_HEADER: &str = "lambda-runtime-function-error-type";

/// Runtime API client for running inside the host.
/// Every call is a single HTTP request that is awaited before returning.
pub struct LiveClient {
    /// E.g. 127.0.0.1:9001
    endpoint: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl fmt::Debug for LiveClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveClient").field("endpoint", &self.endpoint).finish()
    }
}

/// Status, headers and the collected body of a Runtime API response.
struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl LiveClient {
    /// `endpoint` is the value of AWS_LAMBDA_RUNTIME_API, e.g. 127.0.0.1:9001
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn uri(&self, path: &str) -> Result<Uri, String> {
        format!("http://{}{}", self.endpoint, path)
            .parse::<Uri>()
            .map_err(|e| format!("invalid URL for {path}: {e}"))
    }

    /// Sends a request and collects the full response.
    /// Errors are plain strings so that each operation can wrap them into its own variant.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Bytes,
        content_type: &'static str,
        error_type: Option<&str>,
    ) -> Result<ApiResponse, String> {
        let mut builder = Request::builder()
            .method(method)
            .uri(self.uri(path)?)
            .header(CONTENT_TYPE, HeaderValue::from_static(content_type));

        if let Some(error_type) = error_type {
            builder = builder.header(ERROR_TYPE_HEADER, error_type);
        }

        let request = builder
            .body(Full::new(body))
            .map_err(|e| format!("failed to build a request for {path}: {e}"))?;

        let response = self.client.request(request).await.map_err(|e| format!("{path}: {e}"))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| format!("failed to read the response from {path}: {e}"))?
            .to_bytes();

        Ok(ApiResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Posts a report and checks the host accepted it.
    async fn post_report(
        &self,
        path: &str,
        body: Bytes,
        content_type: &'static str,
        error_type: Option<&str>,
    ) -> RuntimeResult<()> {
        let response = self
            .send(Method::POST, path, body, content_type, error_type)
            .await
            .map_err(RuntimeError::Report)?;

        if response.status.is_success() {
            debug!("{path}: {}", response.status);
            Ok(())
        } else {
            Err(RuntimeError::Report(format!(
                "{path} returned {}: {}",
                response.status,
                body_text(&response.body)
            )))
        }
    }
}

impl RuntimeApi for LiveClient {
    async fn next_invocation(&mut self) -> RuntimeResult<Invocation> {
        let path = paths::next_invocation();
        let response = self
            .send(Method::GET, &path, Bytes::new(), "application/json", None)
            .await
            .map_err(RuntimeError::Fetch)?;

        if response.status != StatusCode::OK {
            return Err(RuntimeError::FetchStatus {
                status: response.status.as_u16(),
                body: body_text(&response.body),
            });
        }

        debug!("Received: {}", body_text(&response.body));
        let event = document::parse(&response.body)?;

        Ok(Invocation {
            headers: response.headers,
            event,
        })
    }

    async fn report_success(&mut self, request_id: &str, body: Bytes) -> RuntimeResult<()> {
        self.post_report(&paths::invocation_response(request_id), body, "application/json", None)
            .await
    }

    async fn report_error(&mut self, request_id: &str, error: &RuntimeError) -> RuntimeResult<()> {
        self.post_report(
            &paths::invocation_error(request_id),
            Bytes::from(error.to_string()),
            "text/plain",
            Some(error.error_type()),
        )
        .await
    }

    async fn report_init_error(&mut self, error: &RuntimeError) -> RuntimeResult<()> {
        self.post_report(
            &paths::init_error(),
            Bytes::from(error.to_string()),
            "text/plain",
            Some(error.error_type()),
        )
        .await
    }
}

/// Bodies are expected to be UTF-8, anything else is logged as hex.
fn body_text(body: &Bytes) -> String {
    match std::str::from_utf8(body.as_ref()) {
        Ok(v) => v.to_owned(),
        Err(e) => {
            warn!("Non-UTF-8 response from the Runtime API: {:?}", e);
            hex::encode(body.as_ref())
        }
    }
}
