//! The runtime event loop: fetch, refresh the context, invoke, report.

use crate::api::{Invocation, RuntimeApi, RuntimeClient};
use crate::config::RetryPolicy;
use crate::context::Context;
use crate::document::{self, Document};
use crate::error::{RuntimeError, RuntimeResult};
use crate::handler::Handler;
use hyper::body::Bytes;
use std::env::var;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// The X-Ray trace id of the current invocation is exported under this name.
pub const TRACE_ID_ENV_VAR: &str = "_X_AMZN_TRACE_ID";

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Fetching,
    ContextInit,
    Invoking,
    Reporting,
    Retrying,
    Stopped(StopReason),
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The mock client ran out of invocations
    Clean,
    /// Too many fetch or context failures
    Exhausted,
}

/// Drives a handler with invocations from a Runtime API client, one at a time.
pub struct Runtime<A, H> {
    api: A,
    handler: H,
    context: Context,
    policy: RetryPolicy,
    /// Fetch and context failures so far, never reset
    retries: u32,
    state: State,
}

impl<H: Handler> Runtime<RuntimeClient, H> {
    /// Builds a runtime from the process environment.
    /// Uses the live client if AWS_LAMBDA_RUNTIME_API is set and the mock client otherwise.
    pub async fn from_env(handler: H) -> RuntimeResult<Self> {
        Self::from_lookup(handler, |name| var(name).ok()).await
    }

    /// Same as [`Runtime::from_env`], but with a custom environment lookup.
    pub async fn from_lookup<F>(handler: H, lookup: F) -> RuntimeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (api, config) = RuntimeClient::from_lookup(lookup).await?;
        Ok(Self::new(api, Context::new(config), handler))
    }
}

impl<A: RuntimeApi, H: Handler> Runtime<A, H> {
    pub fn new(api: A, context: Context, handler: H) -> Self {
        Self {
            api,
            handler,
            context,
            policy: RetryPolicy::default(),
            retries: 0,
            state: State::Idle,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Processes invocations until the client signals there is no more work
    /// or the retry budget is used up.
    pub async fn run(&mut self) -> StopReason {
        while self.retries < self.policy.max_retries {
            self.transition(State::Fetching);
            let invocation = match self.api.next_invocation().await {
                Ok(v) => v,
                Err(e) => {
                    error!("Error during next invocation API call: {e}. Going to retry");
                    self.back_off().await;
                    continue;
                }
            };

            // circuit breaker for local runs
            if invocation.is_sentinel() {
                info!("No more invocations, exiting the loop");
                return self.stop(StopReason::Clean);
            }

            let Invocation { headers, event } = invocation;

            self.transition(State::ContextInit);
            if let Err(e) = self.context.refresh(&headers) {
                error!("Cannot initialize the context from headers {headers:?}: {e}");
                self.back_off().await;
                continue;
            }
            std::env::set_var(TRACE_ID_ENV_VAR, &self.context.xray_trace_id);

            self.invoke(event).await;
        }

        error!("Runtime exceeded max number of retries: {}", self.retries);
        self.stop(StopReason::Exhausted)
    }

    /// Runs the handler and reports the outcome. Exactly one report per invocation.
    async fn invoke(&mut self, event: Document) {
        let request_id = self.context.request_id.clone();

        self.transition(State::Invoking);
        debug!("Invoking the handler for {request_id}");
        let outcome = match self.handler.call(&self.context, event).await {
            Ok(response) => document::serialize(&response)
                .map_err(|e| RuntimeError::InvalidHandlerResponse(e.to_string())),
            Err(e) => Err(RuntimeError::Handler(e)),
        };

        self.transition(State::Reporting);
        match outcome {
            Ok(body) => {
                debug!("Handler returned: {}", String::from_utf8_lossy(&body));
                if let Err(e) = self.api.report_success(&request_id, Bytes::from(body)).await {
                    error!("Failed to report the response for {request_id}: {e}");
                }
            }
            Err(e) => {
                warn!("Invocation {request_id} failed: {e}");
                if let Err(report_err) = self.api.report_error(&request_id, &e).await {
                    error!("Failed to report the error for {request_id}: {report_err}");
                }
            }
        }
    }

    async fn back_off(&mut self) {
        self.transition(State::Retrying);
        self.retries += 1;
        let delay = self.policy.backoff(self.retries);
        debug!("Retry {} of {}, sleeping for {delay:?}", self.retries, self.policy.max_retries);
        sleep(delay).await;
    }

    fn transition(&mut self, state: State) {
        debug!("{:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn stop(&mut self, reason: StopReason) -> StopReason {
        self.transition(State::Stopped(reason));
        reason
    }
}

/// Runs `handler` with the Runtime API selected from the process environment.
///
/// Returns `Ok` when the loop stops cleanly, i.e. after the local invocation in mock mode.
pub async fn run<H: Handler>(handler: H) -> RuntimeResult<()> {
    let mut runtime = Runtime::from_env(handler).await?;

    match runtime.run().await {
        StopReason::Clean => Ok(()),
        StopReason::Exhausted => Err(RuntimeError::RetriesExhausted(runtime.retries())),
    }
}
