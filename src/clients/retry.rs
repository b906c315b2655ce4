//! Resilient HTTP Access
//!
//! Every upstream request goes through [`ResilientHttp::get_json`]:
//! - up to `max_attempts` tries, sleeping `backoff × attempt` between them
//! - transport errors and non-success statuses are retried
//! - a successful response is never retried, even if empty
//! - empty or unparseable bodies become `Value::Null` (fail-open)
//! - exhaustion yields a single [`ClientError::Connection`]

use crate::config::{HttpSettings, RetrySettings};
use crate::error::ClientError;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Raw HTTP response (status + body text)
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking GET transport
///
/// Implemented by [`ReqwestTransport`] for real traffic and by test doubles.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse, String>;
}

/// `reqwest::blocking` transport with a per-request timeout
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(settings: &HttpSettings) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpResponse, String> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| e.to_string())?;
        Ok(HttpResponse { status, body })
    }
}

/// Retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff: settings.backoff(),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff: the wait after failed attempt `n` (1-based) is `backoff × n`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Transport + retry policy shared by all source clients
#[derive(Clone)]
pub struct ResilientHttp {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl ResilientHttp {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// GET `url` and parse the body as JSON.
    ///
    /// Returns `Value::Null` for empty or malformed bodies.
    pub fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value, ClientError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.transport.get(url, query) {
                Ok(response) if response.is_success() => {
                    tracing::debug!(
                        "GET {} -> {} ({} bytes)",
                        url,
                        response.status,
                        response.body.len()
                    );
                    return Ok(parse_body(url, &response.body));
                }
                Ok(response) => {
                    last_error = format!("HTTP {}", response.status);
                }
                Err(e) => {
                    last_error = e;
                }
            }

            tracing::debug!("GET {} attempt {}/{} failed: {}", url, attempt, attempts, last_error);
            if attempt < attempts {
                let delay = self.policy.delay_after(attempt);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
        }

        tracing::warn!("GET {} failed after {} attempts: {}", url, attempts, last_error);
        Err(ClientError::Connection {
            endpoint: url.to_string(),
            attempts,
            last_error,
        })
    }
}

fn parse_body(url: &str, body: &str) -> Value {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(e) => {
            // HTML error pages and truncated payloads land here
            tracing::warn!("Unparseable payload from {}: {}", url, e);
            Value::Null
        }
    }
}

/// Coerce a payload to a list. Objects with a `results` array are unwrapped;
/// anything else that is not an array becomes empty.
pub fn as_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Coerce a payload to a mapping. Non-objects become empty.
pub fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Query-parameter helper
pub fn query_pairs(pairs: &[(&str, String)]) -> Vec<(String, String)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport shared by the client tests

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
        pub calls: AtomicUsize,
        pub urls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub fn new(responses: Vec<Result<HttpResponse, String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
            })
        }

        pub fn ok(body: &str) -> Result<HttpResponse, String> {
            Ok(HttpResponse {
                status: 200,
                body: body.to_string(),
            })
        }

        pub fn status(status: u16) -> Result<HttpResponse, String> {
            Ok(HttpResponse {
                status,
                body: String::new(),
            })
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl HttpTransport for ScriptedTransport {
        fn get(&self, url: &str, _query: &[(String, String)]) -> Result<HttpResponse, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("connection refused".to_string()))
        }
    }

    pub fn no_backoff(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_success_first_attempt() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(r#"[1, 2, 3]"#)]);
        let http = ResilientHttp::new(transport.clone(), no_backoff(3));

        let value = http.get_json("https://example.org/a", &[]).unwrap();
        assert_eq!(as_list(value).len(), 3);
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_retries_transport_and_status_errors() {
        let transport = ScriptedTransport::new(vec![
            Err("timeout".to_string()),
            ScriptedTransport::status(503),
            ScriptedTransport::ok(r#"{"id": 7}"#),
        ]);
        let http = ResilientHttp::new(transport.clone(), no_backoff(3));

        let map = as_map(http.get_json("https://example.org/b", &[]).unwrap());
        assert_eq!(map["id"], 7);
        assert_eq!(transport.call_count(), 3);
    }

    #[test]
    fn test_exhaustion_names_endpoint_and_attempts() {
        let transport = ScriptedTransport::new(vec![]);
        let http = ResilientHttp::new(transport.clone(), no_backoff(3));

        let err = http.get_json("https://example.org/down", &[]).unwrap_err();
        let ClientError::Connection { endpoint, attempts, .. } = &err;
        assert_eq!(endpoint, "https://example.org/down");
        assert_eq!(*attempts, 3);
        assert!(err.to_string().contains("after 3 attempts"));
        assert_eq!(transport.call_count(), 3);
    }

    #[test]
    fn test_empty_success_not_retried() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::ok(""),
            ScriptedTransport::ok("[1]"),
        ]);
        let http = ResilientHttp::new(transport.clone(), no_backoff(3));

        let value = http.get_json("https://example.org/empty", &[]).unwrap();
        assert_eq!(value, Value::Null);
        assert!(as_list(value).is_empty());
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_html_error_page_coerced_to_empty() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(
            "<html><body>502 Bad Gateway</body></html>",
        )]);
        let http = ResilientHttp::new(transport, no_backoff(3));

        let value = http.get_json("https://example.org/html", &[]).unwrap();
        assert!(as_map(value).is_empty());
    }

    #[test]
    fn test_as_list_unwraps_results() {
        let value = serde_json::json!({ "total": 2, "results": [{"a": 1}, {"a": 2}] });
        assert_eq!(as_list(value).len(), 2);
        assert!(as_list(serde_json::json!({"total": 0})).is_empty());
        assert!(as_list(serde_json::json!("text")).is_empty());
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(200));
        assert_eq!(policy.delay_after(2), Duration::from_millis(400));
        assert_eq!(RetryPolicy::default().max_attempts, 3);
    }
}
