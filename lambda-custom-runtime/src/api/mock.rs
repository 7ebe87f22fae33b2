use super::{Invocation, RuntimeApi};
use crate::config::{LAMBDA_EVENT_VAR, LOCAL_EVENT_FILE};
use crate::context::{DEADLINE_HEADER, FUNCTION_ARN_HEADER, REQUEST_ID_HEADER, TRACE_ID_HEADER};
use crate::document::{self, Document};
use crate::error::{RuntimeError, RuntimeResult};
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// A request ID substitute for local payloads.
pub const LOCAL_REQUEST_ID: &str = "local-request-id";
const LOCAL_FUNCTION_ARN: &str = "from-local-payload";
const LOCAL_TRACE_ID: &str = "Root=0-00000000-000000000000000000000000;Parent=0000000000000000;Sampled=0;Lineage=00000000:0";
/// Local invocations get this much time before their deadline
const LOCAL_TIMEOUT: Duration = Duration::from_millis(3000);
/// Only one real invocation per process, then the loop is told there is no more work
const MAX_INVOCATIONS: u32 = 1;

/// Runtime API stand-in for running outside the host.
///
/// The event comes from LAMBDA_EVENT or, if that is not set or not a JSON object, from
/// ./test/event.json. Reports are logged and never fail.
#[derive(Debug, Clone)]
pub struct MockClient {
    /// Contents of LAMBDA_EVENT, if set
    inline_event: Option<String>,
    event_file: PathBuf,
    invocations: u32,
}

impl MockClient {
    pub fn new(inline_event: Option<String>, event_file: impl Into<PathBuf>) -> Self {
        Self {
            // an empty var is as good as no var
            inline_event: inline_event.filter(|v| !v.trim().is_empty()),
            event_file: event_file.into(),
            invocations: 0,
        }
    }

    /// Reads LAMBDA_EVENT with the given lookup and uses the default event file.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::new(lookup(LAMBDA_EVENT_VAR), LOCAL_EVENT_FILE)
    }

    /// Number of invocations served so far.
    pub fn invocations(&self) -> u32 {
        self.invocations
    }

    fn read_event(&self) -> RuntimeResult<Document> {
        match &self.inline_event {
            Some(inline) => match document::parse(inline) {
                Ok(event) => {
                    debug!("Event from {LAMBDA_EVENT_VAR}");
                    return Ok(event);
                }
                Err(e) => warn!("{LAMBDA_EVENT_VAR} is not a valid JSON document: {e}"),
            },
            None => debug!("{LAMBDA_EVENT_VAR} is not set"),
        }

        debug!("Reading the event from {}", self.event_file.display());
        let file_error = match std::fs::read(&self.event_file) {
            Ok(contents) => match document::parse(contents) {
                Ok(event) => return Ok(event),
                Err(e) => e.to_string(),
            },
            Err(e) => e.to_string(),
        };

        Err(RuntimeError::Fetch(format!(
            "neither {LAMBDA_EVENT_VAR} nor {} contain a JSON document: {file_error}",
            self.event_file.display()
        )))
    }
}

impl RuntimeApi for MockClient {
    async fn next_invocation(&mut self) -> RuntimeResult<Invocation> {
        if self.invocations >= MAX_INVOCATIONS {
            debug!("Served {} local invocation(s), no more work", self.invocations);
            return Ok(Invocation::sentinel());
        }

        let event = self.read_event()?;
        self.invocations += 1;

        Ok(Invocation {
            headers: local_headers(),
            event,
        })
    }

    async fn report_success(&mut self, request_id: &str, body: Bytes) -> RuntimeResult<()> {
        info!("SUCCESS: Request-Id = {request_id}\n{}", String::from_utf8_lossy(&body));
        Ok(())
    }

    async fn report_error(&mut self, request_id: &str, error: &RuntimeError) -> RuntimeResult<()> {
        let body = Value::Object(document::error_document(error));
        info!("ERROR: Request-Id = {request_id}\n{body}");
        Ok(())
    }

    async fn report_init_error(&mut self, error: &RuntimeError) -> RuntimeResult<()> {
        let body = Value::Object(document::error_document(error));
        info!("INIT ERROR: {body}");
        Ok(())
    }
}

fn local_headers() -> HeaderMap {
    let deadline = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .saturating_add(LOCAL_TIMEOUT)
        .as_millis() as u64;

    let mut headers = HeaderMap::new();
    headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static(LOCAL_REQUEST_ID));
    headers.insert(FUNCTION_ARN_HEADER, HeaderValue::from_static(LOCAL_FUNCTION_ARN));
    headers.insert(TRACE_ID_HEADER, HeaderValue::from_static(LOCAL_TRACE_ID));
    headers.insert(DEADLINE_HEADER, HeaderValue::from(deadline));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FunctionConfig;
    use crate::context::Context;
    use serde_json::json;

    fn temp_file(name: &str, contents: Option<&str>) -> PathBuf {
        let path = std::env::temp_dir().join(format!("mock-client-{}-{name}.json", std::process::id()));
        match contents {
            Some(contents) => std::fs::write(&path, contents).unwrap(),
            None => {
                let _ = std::fs::remove_file(&path);
            }
        }
        path
    }

    #[tokio::test]
    async fn serves_inline_event_once() {
        let mut client = MockClient::new(Some(r#"{"key1":"abc"}"#.to_owned()), temp_file("inline", None));

        let invocation = client.next_invocation().await.unwrap();
        assert_eq!(Value::Object(invocation.event), json!({"key1": "abc"}));
        assert!(!invocation.headers.is_empty());

        // the second call is the circuit breaker
        assert!(client.next_invocation().await.unwrap().is_sentinel());
        assert!(client.next_invocation().await.unwrap().is_sentinel());
        assert_eq!(client.invocations(), 1);
    }

    #[tokio::test]
    async fn local_headers_make_a_valid_context() {
        let mut client = MockClient::new(Some("{}".to_owned()), temp_file("headers", None));
        let invocation = client.next_invocation().await.unwrap();

        let mut ctx = Context::new(FunctionConfig::mock());
        ctx.refresh(&invocation.headers).unwrap();

        assert_eq!(ctx.request_id, LOCAL_REQUEST_ID);
        assert_eq!(ctx.invoked_function_arn, LOCAL_FUNCTION_ARN);
        assert!(ctx.is_before_deadline());
    }

    #[tokio::test]
    async fn falls_back_to_the_event_file() {
        let file = temp_file("fallback", Some(r#"{"from":"file"}"#));

        for inline in [None, Some("not json".to_owned()), Some("[1,2]".to_owned()), Some("  ".to_owned())] {
            let mut client = MockClient::new(inline, &file);
            let invocation = client.next_invocation().await.unwrap();
            assert_eq!(Value::Object(invocation.event), json!({"from": "file"}));
        }

        let _ = std::fs::remove_file(file);
    }

    #[tokio::test]
    async fn fails_without_a_usable_source() {
        let bad_file = temp_file("bad", Some("{ broken"));
        let missing_file = temp_file("missing", None);

        for file in [&bad_file, &missing_file] {
            let mut client = MockClient::new(None, file);

            // a failed fetch does not use up the invocation
            for _ in 0..3 {
                let err = client.next_invocation().await.unwrap_err();
                assert!(matches!(err, RuntimeError::Fetch(_)), "{err:?}");
            }
            assert_eq!(client.invocations(), 0);
        }

        let _ = std::fs::remove_file(bad_file);
    }

    #[tokio::test]
    async fn reports_never_fail() {
        let mut client = MockClient::new(None, temp_file("reports", None));
        let err = RuntimeError::Handler("boom".into());

        client.report_success(LOCAL_REQUEST_ID, Bytes::from_static(b"{}")).await.unwrap();
        client.report_error(LOCAL_REQUEST_ID, &err).await.unwrap();
        client.report_init_error(&err).await.unwrap();
    }
}
