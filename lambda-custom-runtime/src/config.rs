use crate::error::{RuntimeError, RuntimeResult};
use hyper::Uri;
use serde::{Deserialize, Serialize};
use std::env::var;
use std::time::Duration;

/// Base address of the Runtime API, e.g. 127.0.0.1:9001.
/// Its presence means we are running inside the host.
pub const RUNTIME_API_VAR: &str = "AWS_LAMBDA_RUNTIME_API";
pub const FUNCTION_NAME_VAR: &str = "AWS_LAMBDA_FUNCTION_NAME";
pub const FUNCTION_VERSION_VAR: &str = "AWS_LAMBDA_FUNCTION_VERSION";
pub const LOG_GROUP_NAME_VAR: &str = "AWS_LAMBDA_LOG_GROUP_NAME";
pub const LOG_STREAM_NAME_VAR: &str = "AWS_LAMBDA_LOG_STREAM_NAME";
pub const FUNCTION_MEMORY_SIZE_VAR: &str = "AWS_LAMBDA_FUNCTION_MEMORY_SIZE";
/// Event payload for local runs, as JSON text
pub const LAMBDA_EVENT_VAR: &str = "LAMBDA_EVENT";
/// Event payload for local runs if LAMBDA_EVENT is not usable, relative to the working dir
pub const LOCAL_EVENT_FILE: &str = "./test/event.json";

/// Per-process function settings passed to the handler with every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub function_name: String,
    pub function_version: String,
    pub memory_limit_in_mb: u32,
    pub log_group_name: String,
    pub log_stream_name: String,
}

impl FunctionConfig {
    /// Reads the function settings from the process environment.
    pub fn from_env() -> RuntimeResult<Self> {
        Self::from_lookup(|name| var(name).ok())
    }

    /// Reads the function settings with a custom variable lookup.
    /// All five variables are required.
    pub fn from_lookup<F>(lookup: F) -> RuntimeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| lookup(name).ok_or_else(|| RuntimeError::MissingConfiguration(name.to_owned()));

        let function_name = required(FUNCTION_NAME_VAR)?;
        let function_version = required(FUNCTION_VERSION_VAR)?;
        let log_group_name = required(LOG_GROUP_NAME_VAR)?;
        let log_stream_name = required(LOG_STREAM_NAME_VAR)?;
        let memory = required(FUNCTION_MEMORY_SIZE_VAR)?;

        let memory_limit_in_mb = memory.trim().parse::<u32>().map_err(|_| {
            RuntimeError::InvalidConfiguration(format!(
                "{FUNCTION_MEMORY_SIZE_VAR} must be a whole number of MB, got {memory}"
            ))
        })?;

        Ok(Self {
            function_name,
            function_version,
            memory_limit_in_mb,
            log_group_name,
            log_stream_name,
        })
    }

    /// Placeholder settings for running outside the host.
    pub fn mock() -> Self {
        Self {
            function_name: "mockup function name".to_owned(),
            function_version: "1".to_owned(),
            memory_limit_in_mb: 1024,
            log_group_name: "log group name".to_owned(),
            log_stream_name: "log stream name".to_owned(),
        }
    }
}

/// Checks that the Runtime API address can be used as `http://{endpoint}`
/// and returns it without surrounding whitespace.
pub fn validate_endpoint(endpoint: &str) -> RuntimeResult<String> {
    let endpoint = endpoint.trim();

    let uri = format!("http://{endpoint}/").parse::<Uri>().map_err(|e| {
        RuntimeError::InvalidConfiguration(format!("{RUNTIME_API_VAR} is not a valid address: {endpoint} ({e})"))
    })?;

    // anything beyond host:port ends up in the path and would break the URL scheme
    match uri.authority() {
        Some(authority) if !endpoint.is_empty() && authority.as_str() == endpoint => Ok(endpoint.to_owned()),
        _ => Err(RuntimeError::InvalidConfiguration(format!(
            "{RUNTIME_API_VAR} must be host:port, e.g. 127.0.0.1:9001, got {endpoint}"
        ))),
    }
}

/// How the runtime loop reacts to protocol failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The loop stops once this many fetch or context failures accumulated.
    pub max_retries: u32,
    /// The n-th consecutive failure sleeps for n units.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff for the given retry count.
    pub fn backoff(&self, retries: u32) -> Duration {
        self.backoff_unit.saturating_mul(retries)
    }
}
