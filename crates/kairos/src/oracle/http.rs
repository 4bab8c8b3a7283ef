//! HTTP client for a remote decision backend.
//!
//! The backend exposes `POST /analyze`, which takes an [`OracleRequest`]
//! and answers with `{intent, confidence, action, reasoning, nudge_message?}`,
//! and `GET /health` for readiness checks. Responses are validated against a
//! JSON Schema derived from [`OracleResponse`] before they are trusted.

use std::time::{Duration, Instant};

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::retry::RetryConfig;
use super::{DecisionOracle, OracleError, OracleFuture, OracleRequest, default_nudge_message};
use crate::{Decision, Intent, json_schema_for};

/// Wire form of the backend's `action` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
enum WireAction {
    None,
    Observe,
    Nudge,
}

/// Wire form of an `/analyze` response.
#[derive(Debug, Deserialize, JsonSchema)]
struct OracleResponse {
    intent: Intent,
    #[schemars(range(min = 0.0, max = 1.0))]
    confidence: f64,
    action: WireAction,
    #[schemars(length(min = 1))]
    reasoning: String,
    #[serde(default)]
    nudge_message: Option<String>,
}

/// [`DecisionOracle`] backed by a remote service.
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryConfig,
    validator: jsonschema::Validator,
}

impl HttpOracle {
    /// Create a client for `endpoint` (scheme and host, no trailing path).
    ///
    /// `timeout` bounds each individual HTTP request.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, String> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(format!("oracle endpoint must be an http(s) URL, got '{endpoint}'"));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("kairos/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        let validator = jsonschema::validator_for(&json_schema_for::<OracleResponse>())
            .map_err(|e| format!("invalid oracle response schema: {e}"))?;
        Ok(Self {
            client,
            endpoint,
            retry: RetryConfig::default(),
            validator,
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `GET {endpoint}/health`. Informational only; the agent never
    /// requires a healthy backend to keep running.
    pub async fn probe(&self) -> Result<serde_json::Value, OracleError> {
        let resp = self
            .client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| OracleError::Transport(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(OracleError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| OracleError::Malformed(e.to_string()))
    }

    async fn analyze_once(&self, request: &OracleRequest) -> Result<Decision, OracleError> {
        trace!(
            "Oracle request payload size: {} bytes",
            serde_json::to_string(request).map_or(0, |s| s.len())
        );
        let start = Instant::now();

        let resp = self
            .client
            .post(format!("{}/analyze", self.endpoint))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Transport(format!("timed out: {e}"))
                } else {
                    OracleError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| OracleError::Transport(format!("failed to read response: {e}")))?;

        debug!(
            "Oracle response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(OracleError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        self.parse_response(&text, request)
    }

    fn parse_response(&self, body: &str, request: &OracleRequest) -> Result<Decision, OracleError> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| OracleError::Malformed(e.to_string()))?;

        let errors: Vec<String> = self
            .validator
            .iter_errors(&value)
            .map(|e| format!("{}: {e}", e.instance_path()))
            .collect();
        if !errors.is_empty() {
            return Err(OracleError::Malformed(errors.join("; ")));
        }

        let resp: OracleResponse =
            serde_json::from_value(value).map_err(|e| OracleError::Malformed(e.to_string()))?;
        if resp.reasoning.trim().is_empty() {
            return Err(OracleError::Malformed("empty reasoning".into()));
        }

        let timestamp = request.activity_summary.period_end;
        Ok(match resp.action {
            WireAction::Nudge => {
                let message = resp
                    .nudge_message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| default_nudge_message(&request.user_goals, timestamp));
                Decision::nudge(resp.intent, resp.confidence, resp.reasoning, message, timestamp)
            }
            WireAction::None | WireAction::Observe => {
                Decision::observe(resp.intent, resp.confidence, resp.reasoning, timestamp)
            }
        })
    }
}

impl DecisionOracle for HttpOracle {
    fn name(&self) -> &str {
        "http"
    }

    fn decide<'a>(&'a self, request: &'a OracleRequest) -> OracleFuture<'a> {
        Box::pin(async move {
            let mut attempt = 0;
            loop {
                match self.analyze_once(request).await {
                    Ok(decision) => return Ok(decision),
                    Err(e) if self.retry.should_retry(&e, attempt) => {
                        let delay = self.retry.delay_for_attempt(attempt);
                        warn!(
                            "Oracle call failed ({e}); retrying in {:.2}s ({}/{})",
                            delay.as_secs_f64(),
                            attempt + 1,
                            self.retry.max_retries
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Action;
    use crate::activity::ActivitySummary;
    use crate::classifier::Classification;
    use chrono::{TimeDelta, TimeZone, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve canned responses in order; the last one repeats.
    async fn fake_backend(responses: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = responses[n.min(responses.len() - 1)];
                tokio::spawn(async move {
                    read_request(&mut sock).await;
                    let resp = format!(
                        "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = sock.write_all(resp.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });

        (format!("http://{addr}"), hits)
    }

    async fn read_request(sock: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let Ok(n) = sock.read(&mut chunk).await else {
                return;
            };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let content_length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn request() -> OracleRequest {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        OracleRequest {
            activity_summary: ActivitySummary::from_samples(
                &[],
                start,
                start + TimeDelta::seconds(300),
                5,
            ),
            user_goals: vec!["coding".into()],
            local_classification: Classification {
                intent: Intent::Unknown,
                confidence: 0.0,
                reasoning: "idle".into(),
            },
        }
    }

    fn oracle(endpoint: &str) -> HttpOracle {
        HttpOracle::new(endpoint, Duration::from_secs(2))
            .unwrap()
            .with_retry(RetryConfig {
                initial_delay: Duration::from_millis(5),
                ..RetryConfig::with_retries(2)
            })
    }

    #[test]
    fn rejects_non_http_endpoint() {
        assert!(HttpOracle::new("localhost:8080", Duration::from_secs(1)).is_err());
        let ok = HttpOracle::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(ok.endpoint(), "http://localhost:8080");
    }

    #[test]
    fn parses_legacy_none_action() {
        let o = oracle("http://localhost:1");
        let d = o
            .parse_response(
                r#"{"intent":"productive","confidence":0.9,"action":"none","reasoning":"coding"}"#,
                &request(),
            )
            .unwrap();
        assert_eq!(d.action, Action::Observe);
        assert!(d.nudge_message.is_none());
        assert_eq!(d.timestamp, request().activity_summary.period_end);
    }

    #[test]
    fn nudge_without_message_gets_default() {
        let o = oracle("http://localhost:1");
        let d = o
            .parse_response(
                r#"{"intent":"unproductive","confidence":0.8,"action":"nudge","reasoning":"videos"}"#,
                &request(),
            )
            .unwrap();
        assert_eq!(d.action, Action::Nudge);
        assert!(d.nudge_message.unwrap().contains("coding"));
    }

    #[test]
    fn schema_rejects_bad_payloads() {
        let o = oracle("http://localhost:1");
        for body in [
            r#"{"intent":"productive","confidence":1.5,"action":"none","reasoning":"x"}"#,
            r#"{"intent":"busy","confidence":0.5,"action":"none","reasoning":"x"}"#,
            r#"{"intent":"productive","confidence":0.5,"action":"block","reasoning":"x"}"#,
            r#"{"intent":"productive","confidence":0.5,"action":"none","reasoning":""}"#,
            r#"{"intent":"productive","confidence":0.5,"action":"none"}"#,
            "not json",
        ] {
            let err = o.parse_response(body, &request()).unwrap_err();
            assert!(matches!(err, OracleError::Malformed(_)), "{body}: {err}");
        }
    }

    #[tokio::test]
    async fn decide_round_trips_over_http() {
        let (url, hits) = fake_backend(vec![(
            200,
            r#"{"intent":"unproductive","confidence":0.8,"action":"nudge","reasoning":"videos","nudge_message":"Back to coding?"}"#,
        )])
        .await;
        let d = oracle(&url).decide(&request()).await.unwrap();
        assert_eq!(d.intent, Intent::Unproductive);
        assert_eq!(d.nudge_message.as_deref(), Some("Back to coding?"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let (url, hits) = fake_backend(vec![
            (503, "busy"),
            (200, r#"{"intent":"neutral","confidence":0.5,"action":"observe","reasoning":"mixed"}"#),
        ])
        .await;
        let d = oracle(&url).decide(&request()).await.unwrap();
        assert_eq!(d.intent, Intent::Neutral);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let (url, hits) = fake_backend(vec![(400, "bad request")]).await;
        let err = oracle(&url).decide(&request()).await.unwrap_err();
        assert!(matches!(err, OracleError::Http { status: 400, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn probe_reads_health() {
        let (url, _) = fake_backend(vec![(200, r#"{"status":"healthy"}"#)]).await;
        let health = oracle(&url).probe().await.unwrap();
        assert_eq!(health["status"], "healthy");
    }
}
