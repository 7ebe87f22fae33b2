//! Errors raised by the runtime, the Runtime API clients and the handler adapters.

use thiserror::Error;

/// The error type handlers return, same as `lambda_runtime::Error`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong between fetching an invocation and reporting its outcome.
///
/// Protocol-level failures (`Fetch*`, `*RuntimeHeader`) are counted against the retry budget
/// by the runtime loop. Handler-level failures (`Handler`, `InvalidHandlerResponse`) are
/// reported to the host and never retried.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A mandatory environment variable is not set. Fatal at startup.
    #[error("Missing environment variable: {0}")]
    MissingConfiguration(String),

    /// An environment variable is set, but its value is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A mandatory invocation header is absent from the next invocation response.
    #[error("Missing runtime header: {0}")]
    MissingRuntimeHeader(String),

    /// An invocation header is present, but cannot be interpreted.
    #[error("Invalid runtime header {name}: {value}")]
    InvalidRuntimeHeader { name: String, value: String },

    /// The next invocation could not be fetched, e.g. the host is unreachable.
    #[error("Failed to fetch the next invocation: {0}")]
    Fetch(String),

    /// The Runtime API answered the next invocation request with a non-200 status.
    #[error("Next invocation request failed with status {status}: {body}")]
    FetchStatus { status: u16, body: String },

    /// The payload is not valid JSON or is not a JSON object.
    #[error("Malformed JSON document: {0}")]
    MalformedDocument(String),

    /// A value cannot be represented as JSON.
    #[error("Value cannot be serialized to JSON: {0}")]
    UnserializableResponse(String),

    /// The handler succeeded, but its response could not be sent as a success.
    #[error("Invalid handler response: {0}")]
    InvalidHandlerResponse(String),

    /// The handler failed. Carries the original cause.
    #[error("Handler error: {0}")]
    Handler(#[source] BoxError),

    /// A report call (response, error or init error) did not reach the host.
    #[error("Failed to report to the Runtime API: {0}")]
    Report(String),

    /// The runtime loop gave up after too many protocol failures.
    #[error("Runtime exceeded max number of retries: {0}")]
    RetriesExhausted(u32),
}

impl RuntimeError {
    /// A stable error type name sent to the host alongside error reports.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::MissingConfiguration(_) => "Runtime.MissingConfiguration",
            Self::InvalidConfiguration(_) => "Runtime.InvalidConfiguration",
            Self::MissingRuntimeHeader(_) => "Runtime.MissingRuntimeHeader",
            Self::InvalidRuntimeHeader { .. } => "Runtime.InvalidRuntimeHeader",
            Self::Fetch(_) | Self::FetchStatus { .. } => "Runtime.FetchError",
            Self::MalformedDocument(_) => "Runtime.MalformedDocument",
            Self::UnserializableResponse(_) => "Runtime.UnserializableResponse",
            Self::InvalidHandlerResponse(_) => "Runtime.InvalidHandlerResponse",
            Self::Handler(_) => "Runtime.HandlerError",
            Self::Report(_) => "Runtime.ReportError",
            Self::RetriesExhausted(_) => "Runtime.RetriesExhausted",
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
