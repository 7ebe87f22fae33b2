//! Clients for the host's Runtime API.
//!
//! [`LiveClient`] talks HTTP to the host. [`MockClient`] serves a single local event and
//! logs the outcome, so a function can be run outside the host. [`RuntimeClient`] picks
//! one of them from the environment.

use crate::config::{validate_endpoint, FunctionConfig, RUNTIME_API_VAR};
use crate::document::Document;
use crate::error::{RuntimeError, RuntimeResult};
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use tracing::{debug, error};

pub mod live;
pub mod mock;
pub mod paths;

pub use live::LiveClient;
pub use mock::MockClient;

/// A fetched invocation: the raw response headers and the event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub headers: HeaderMap,
    pub event: Document,
}

impl Invocation {
    /// The empty invocation a client returns when there is no more work.
    pub fn sentinel() -> Self {
        Self::default()
    }

    /// True for the "no more work" marker: no headers and an empty event.
    pub fn is_sentinel(&self) -> bool {
        self.headers.is_empty() && self.event.is_empty()
    }
}

/// The four operations of the Runtime API the runtime loop depends on.
#[allow(async_fn_in_trait)]
pub trait RuntimeApi {
    /// Waits for the next invocation.
    async fn next_invocation(&mut self) -> RuntimeResult<Invocation>;

    /// Sends the serialized handler response for `request_id`.
    async fn report_success(&mut self, request_id: &str, body: Bytes) -> RuntimeResult<()>;

    /// Reports a failed invocation. Best effort: callers only log the result.
    async fn report_error(&mut self, request_id: &str, error: &RuntimeError) -> RuntimeResult<()>;

    /// Reports a failure that prevented the runtime from starting.
    async fn report_init_error(&mut self, error: &RuntimeError) -> RuntimeResult<()>;
}

/// The Runtime API client chosen at startup.
#[derive(Debug)]
pub enum RuntimeClient {
    /// Running inside the host
    Live(LiveClient),
    /// Running locally, e.g. in docker or `cargo run`
    Mock(MockClient),
}

impl RuntimeClient {
    /// Selects the live client if `AWS_LAMBDA_RUNTIME_API` is set and the mock otherwise.
    /// Returns the function settings matching the client: read from the environment for
    /// the live client, placeholders for the mock.
    ///
    /// A configuration failure in live mode is reported to the init error endpoint before
    /// it is returned.
    pub async fn from_lookup<F>(lookup: F) -> RuntimeResult<(Self, FunctionConfig)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = match lookup(RUNTIME_API_VAR) {
            Some(v) => v,
            None => {
                debug!("{RUNTIME_API_VAR} is not set, running outside Lambda with a mock Runtime API");
                return Ok((Self::Mock(MockClient::from_lookup(&lookup)), FunctionConfig::mock()));
            }
        };

        // there is nowhere to report an invalid endpoint to
        let endpoint = validate_endpoint(&endpoint)?;
        debug!("Running inside Lambda, Runtime API at {endpoint}");
        let mut client = Self::Live(LiveClient::new(endpoint));

        match FunctionConfig::from_lookup(&lookup) {
            Ok(config) => Ok((client, config)),
            Err(e) => {
                error!("Error during initialization: {e}");
                if let Err(report_err) = client.report_init_error(&e).await {
                    error!("Failed to report the init error: {report_err}");
                }
                Err(e)
            }
        }
    }
}

impl RuntimeApi for RuntimeClient {
    async fn next_invocation(&mut self) -> RuntimeResult<Invocation> {
        match self {
            Self::Live(client) => client.next_invocation().await,
            Self::Mock(client) => client.next_invocation().await,
        }
    }

    async fn report_success(&mut self, request_id: &str, body: Bytes) -> RuntimeResult<()> {
        match self {
            Self::Live(client) => client.report_success(request_id, body).await,
            Self::Mock(client) => client.report_success(request_id, body).await,
        }
    }

    async fn report_error(&mut self, request_id: &str, error: &RuntimeError) -> RuntimeResult<()> {
        match self {
            Self::Live(client) => client.report_error(request_id, error).await,
            Self::Mock(client) => client.report_error(request_id, error).await,
        }
    }

    async fn report_init_error(&mut self, error: &RuntimeError) -> RuntimeResult<()> {
        match self {
            Self::Live(client) => client.report_init_error(error).await,
            Self::Mock(client) => client.report_init_error(error).await,
        }
    }
}
