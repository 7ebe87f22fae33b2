//! Shared test helpers: a local Runtime API emulator and a recording client wrapper.

#![allow(dead_code)]

use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use lambda_custom_runtime::api::{Invocation, RuntimeApi};
use lambda_custom_runtime::{RuntimeError, RuntimeResult};
use regex::Regex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::net::TcpListener;

/// Extracts the request ID from /runtime/invocation/[aws-req-id]/(response|error)
static REQUEST_ID_REGEX: OnceLock<Regex> = OnceLock::new();

/// What the emulator answers to the next `GET .../invocation/next`.
#[derive(Debug, Clone)]
pub enum Next {
    Invocation { headers: Vec<(String, String)>, body: String },
    Status(u16, String),
}

impl Next {
    /// An invocation with all four mandatory headers.
    pub fn invocation(request_id: &str, body: &str) -> Self {
        Self::Invocation {
            headers: vec![
                ("Lambda-Runtime-Aws-Request-Id".to_owned(), request_id.to_owned()),
                (
                    "Lambda-Runtime-Invoked-Function-Arn".to_owned(),
                    "arn:aws:lambda:us-east-1:123456789012:function:my-lambda".to_owned(),
                ),
                ("Lambda-Runtime-Deadline-Ms".to_owned(), "2035313041000".to_owned()),
                (
                    "Lambda-Runtime-Trace-Id".to_owned(),
                    "Root=1-6667af77-3f5a28b931d7678525d90593;Parent=66ab8e86299a69bc;Sampled=0".to_owned(),
                ),
            ],
            body: body.to_owned(),
        }
    }

    /// Same as [`Next::invocation`] without one of the headers.
    pub fn invocation_without(request_id: &str, body: &str, missing: &str) -> Self {
        match Self::invocation(request_id, body) {
            Self::Invocation { mut headers, body } => {
                headers.retain(|(name, _)| !name.eq_ignore_ascii_case(missing));
                Self::Invocation { headers, body }
            }
            other => other,
        }
    }
}

/// A report received by the emulator.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Success { request_id: String, body: String },
    Error { request_id: String, body: String, error_type: Option<String> },
    InitError { body: String, error_type: Option<String> },
}

#[derive(Default)]
struct EmulatorState {
    queue: VecDeque<Next>,
    next_calls: usize,
    reports: Vec<Report>,
}

/// Serves the Runtime API on a random local port. Once the queue runs dry every
/// `/next` call gets a 500, which the runtime counts as a fetch failure.
pub struct Emulator {
    addr: SocketAddr,
    state: Arc<Mutex<EmulatorState>>,
}

impl Emulator {
    pub async fn start(queue: Vec<Next>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind the emulator");
        let addr = listener.local_addr().expect("Failed to get the emulator address");
        let state = Arc::new(Mutex::new(EmulatorState {
            queue: queue.into(),
            ..Default::default()
        }));

        let server_state = state.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(v) => v,
                    Err(_) => return,
                };
                let io = TokioIo::new(stream);
                let state = server_state.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| lambda_api_handler(req, state.clone()));
                    let _ = http1::Builder::new().serve_connection(io, service).await;
                });
            }
        });

        Self { addr, state }
    }

    /// The value for AWS_LAMBDA_RUNTIME_API
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.state.lock().unwrap().reports.clone()
    }

    pub fn next_calls(&self) -> usize {
        self.state.lock().unwrap().next_calls
    }
}

async fn lambda_api_handler(
    req: Request<hyper::body::Incoming>,
    state: Arc<Mutex<EmulatorState>>,
) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error> {
    if req.method() == Method::GET && req.uri().path() == "/2018-06-01/runtime/invocation/next" {
        return Ok(next_invocation(&state));
    }

    if req.method() != Method::POST {
        return Ok(status(StatusCode::NOT_FOUND, "unknown request"));
    }

    let path = req.uri().path().to_owned();
    let error_type = req
        .headers()
        .get("Lambda-Runtime-Function-Error-Type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = String::from_utf8_lossy(&req.into_body().collect().await?.to_bytes()).into_owned();

    if path == "/2018-06-01/runtime/init/error" {
        state.lock().unwrap().reports.push(Report::InitError { body, error_type });
        return Ok(status(StatusCode::ACCEPTED, ""));
    }

    let regex = REQUEST_ID_REGEX.get_or_init(|| {
        Regex::new(r"^/2018-06-01/runtime/invocation/(.+)/(response|error)$").expect("Invalid request ID regex")
    });
    let Some(captures) = regex.captures(&path) else {
        return Ok(status(StatusCode::NOT_FOUND, "unknown request"));
    };
    let request_id = captures[1].to_owned();

    let report = if &captures[2] == "response" {
        Report::Success { request_id, body }
    } else {
        Report::Error {
            request_id,
            body,
            error_type,
        }
    };
    state.lock().unwrap().reports.push(report);

    Ok(status(StatusCode::ACCEPTED, ""))
}

fn next_invocation(state: &Arc<Mutex<EmulatorState>>) -> Response<BoxBody<Bytes, hyper::Error>> {
    let next = {
        let mut state = state.lock().unwrap();
        state.next_calls += 1;
        state.queue.pop_front()
    };

    match next {
        Some(Next::Invocation { headers, body }) => {
            let mut builder = Response::builder().status(StatusCode::OK);
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            builder.body(full(body)).expect("Failed to create a response")
        }
        Some(Next::Status(code, body)) => {
            status(StatusCode::from_u16(code).expect("Invalid status code"), &body)
        }
        None => status(StatusCode::INTERNAL_SERVER_ERROR, "no more invocations"),
    }
}

fn status(code: StatusCode, body: &str) -> Response<BoxBody<Bytes, hyper::Error>> {
    let body = if body.is_empty() { empty() } else { full(body.to_owned()) };
    Response::builder().status(code).body(body).expect("Failed to create a response")
}

fn empty() -> BoxBody<Bytes, hyper::Error> {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, hyper::Error> {
    Full::new(chunk.into()).map_err(|never| match never {}).boxed()
}

/// A call made through a [`Recording`] client.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Next { ok: bool },
    Success { request_id: String, body: String },
    Error { request_id: String, error: String },
    InitError { error: String },
}

/// Wraps any client and records every call made through it.
pub struct Recording<A> {
    inner: A,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl<A> Recording<A> {
    pub fn new(inner: A) -> (Self, Arc<Mutex<Vec<Call>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner,
                calls: calls.clone(),
            },
            calls,
        )
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl<A: RuntimeApi> RuntimeApi for Recording<A> {
    async fn next_invocation(&mut self) -> RuntimeResult<Invocation> {
        let result = self.inner.next_invocation().await;
        self.record(Call::Next { ok: result.is_ok() });
        result
    }

    async fn report_success(&mut self, request_id: &str, body: Bytes) -> RuntimeResult<()> {
        self.record(Call::Success {
            request_id: request_id.to_owned(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
        self.inner.report_success(request_id, body).await
    }

    async fn report_error(&mut self, request_id: &str, error: &RuntimeError) -> RuntimeResult<()> {
        self.record(Call::Error {
            request_id: request_id.to_owned(),
            error: error.to_string(),
        });
        self.inner.report_error(request_id, error).await
    }

    async fn report_init_error(&mut self, error: &RuntimeError) -> RuntimeResult<()> {
        self.record(Call::InitError {
            error: error.to_string(),
        });
        self.inner.report_init_error(error).await
    }
}

/// A client that plays back scripted fetch results and accepts every report.
pub struct Scripted {
    results: VecDeque<RuntimeResult<Invocation>>,
}

impl Scripted {
    /// Once the script runs out, every fetch returns the sentinel.
    pub fn new(results: Vec<RuntimeResult<Invocation>>) -> Self {
        Self { results: results.into() }
    }
}

impl RuntimeApi for Scripted {
    async fn next_invocation(&mut self) -> RuntimeResult<Invocation> {
        self.results.pop_front().unwrap_or_else(|| Ok(Invocation::sentinel()))
    }

    async fn report_success(&mut self, _request_id: &str, _body: Bytes) -> RuntimeResult<()> {
        Ok(())
    }

    async fn report_error(&mut self, _request_id: &str, _error: &RuntimeError) -> RuntimeResult<()> {
        Ok(())
    }

    async fn report_init_error(&mut self, _error: &RuntimeError) -> RuntimeResult<()> {
        Ok(())
    }
}

/// Headers with all four mandatory invocation fields.
pub fn invocation(request_id: &str, event: &str) -> Invocation {
    let mut headers = hyper::header::HeaderMap::new();
    headers.insert("lambda-runtime-aws-request-id", request_id.parse().unwrap());
    headers.insert("lambda-runtime-invoked-function-arn", "arn:aws:lambda:local".parse().unwrap());
    headers.insert("lambda-runtime-deadline-ms", "2035313041000".parse().unwrap());
    headers.insert("lambda-runtime-trace-id", "Root=1-0-0".parse().unwrap());

    Invocation {
        headers,
        event: lambda_custom_runtime::document::parse(event).unwrap(),
    }
}
