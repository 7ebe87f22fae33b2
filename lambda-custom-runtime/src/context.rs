//! The invocation context passed to the handler.
//!
//! Function settings are fixed for the lifetime of the process. Invocation fields are
//! reset and repopulated from the next invocation headers, see
//! https://docs.aws.amazon.com/lambda/latest/dg/runtimes-api.html#runtimes-api-next

use crate::config::FunctionConfig;
use crate::document::{self, Document};
use crate::error::{RuntimeError, RuntimeResult};
use hyper::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

pub const REQUEST_ID_HEADER: &str = "lambda-runtime-aws-request-id";
pub const FUNCTION_ARN_HEADER: &str = "lambda-runtime-invoked-function-arn";
pub const DEADLINE_HEADER: &str = "lambda-runtime-deadline-ms";
pub const TRACE_ID_HEADER: &str = "lambda-runtime-trace-id";
pub const CLIENT_CONTEXT_HEADER: &str = "lambda-runtime-client-context";
pub const COGNITO_IDENTITY_HEADER: &str = "lambda-runtime-cognito-identity";

/// Function settings plus the details of the current invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub env_config: FunctionConfig,
    /// Empty until the first invocation arrives
    pub request_id: String,
    pub invoked_function_arn: String,
    /// Unix epoch in milliseconds
    pub deadline_ms: u64,
    pub xray_trace_id: String,
    pub client_context: Option<Document>,
    pub identity: Option<Document>,
}

impl Context {
    pub fn new(env_config: FunctionConfig) -> Self {
        Self {
            env_config,
            request_id: String::new(),
            invoked_function_arn: String::new(),
            deadline_ms: 0,
            xray_trace_id: String::new(),
            client_context: None,
            identity: None,
        }
    }

    /// Replaces the invocation fields with the values from the next invocation headers.
    /// The function settings are not touched.
    pub fn refresh(&mut self, headers: &HeaderMap) -> RuntimeResult<()> {
        self.clear_invocation();

        self.request_id = required_header(headers, REQUEST_ID_HEADER)?;
        self.invoked_function_arn = required_header(headers, FUNCTION_ARN_HEADER)?;

        let deadline = required_header(headers, DEADLINE_HEADER)?;
        self.deadline_ms = deadline
            .trim()
            .parse::<u64>()
            .map_err(|_| RuntimeError::InvalidRuntimeHeader {
                name: DEADLINE_HEADER.to_owned(),
                value: deadline.clone(),
            })?;

        self.xray_trace_id = required_header(headers, TRACE_ID_HEADER)?;

        // these two are optional and are only passed through if they make sense
        self.client_context = optional_document(headers, CLIENT_CONTEXT_HEADER);
        self.identity = optional_document(headers, COGNITO_IDENTITY_HEADER);

        Ok(())
    }

    /// The point in time after which the host may terminate the invocation.
    pub fn deadline(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.deadline_ms)
    }

    /// Time left until the deadline, zero if it already passed.
    pub fn remaining_time(&self) -> Duration {
        self.deadline()
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_before_deadline(&self) -> bool {
        SystemTime::now() < self.deadline()
    }

    fn clear_invocation(&mut self) {
        self.request_id.clear();
        self.invoked_function_arn.clear();
        self.deadline_ms = 0;
        self.xray_trace_id.clear();
        self.client_context = None;
        self.identity = None;
    }
}

fn required_header(headers: &HeaderMap, name: &str) -> RuntimeResult<String> {
    let value = headers
        .get(name)
        .ok_or_else(|| RuntimeError::MissingRuntimeHeader(name.to_owned()))?;

    match value.to_str() {
        Ok(v) => Ok(v.to_owned()),
        Err(_) => Err(RuntimeError::InvalidRuntimeHeader {
            name: name.to_owned(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        }),
    }
}

fn optional_document(headers: &HeaderMap, name: &str) -> Option<Document> {
    let value = headers.get(name)?;

    match document::parse(value.as_bytes()) {
        Ok(v) if !v.is_empty() => Some(v),
        Ok(_) => None,
        Err(e) => {
            warn!("Ignoring {name} header: {e}");
            None
        }
    }
}
