use std::error::Error as StdError;
use std::time::{Duration, Instant};

use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::Method;

use crate::delivery::{DeliveryOutcome, WebhookRequest};
use crate::headers::{sanitize_headers, to_header_map};
use crate::response::ResponsePreview;
use crate::target::ForwardTarget;

/// Transport timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors constructing a [`Forwarder`].
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("failed to build HTTP client: {0}")]
    BuildClient(#[source] reqwest::Error),
}

/// Why a single delivery produced no response.
#[derive(Debug, thiserror::Error)]
enum DeliveryError {
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("{}", describe(.0))]
    Transport(#[from] reqwest::Error),
}

/// Configuration for a [`Forwarder`].
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub target: ForwardTarget,
    /// Upper bound on one local request, connect through body read.
    pub timeout: Duration,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            target: ForwardTarget::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// What the local target sent back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
}

impl ForwardedResponse {
    pub fn preview(&self) -> ResponsePreview {
        ResponsePreview::classify(self.content_type.as_deref(), self.content_length, &self.body)
    }
}

/// Everything known about one delivery once it finished.
#[derive(Debug, Clone)]
pub struct ForwardReport {
    /// Upper-cased request method.
    pub method: String,
    /// Path the relay received the webhook on.
    pub path: String,
    pub target_url: String,
    pub outcome: DeliveryOutcome,
    /// `None` when the request failed at the transport level.
    pub response: Option<ForwardedResponse>,
}

/// Re-issues relayed webhooks against the local target.
///
/// Non-2xx responses are reported as data; only transport failures produce
/// an error outcome.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    target: ForwardTarget,
}

impl Forwarder {
    pub fn new(config: ForwarderConfig) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("hooktunnel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ForwardError::BuildClient)?;

        Ok(Self {
            client,
            target: config.target,
        })
    }

    pub fn target(&self) -> &ForwardTarget {
        &self.target
    }

    /// URL a delivery would be sent to.
    pub fn resolve_url(&self, endpoint_default: Option<&str>) -> String {
        self.target.resolve(endpoint_default)
    }

    /// Forward one webhook and time it. Never fails: transport errors are
    /// folded into the returned outcome.
    pub async fn forward(
        &self,
        request: &WebhookRequest,
        endpoint_default: Option<&str>,
    ) -> ForwardReport {
        let target_url = self.resolve_url(endpoint_default);

        let started = Instant::now();
        let result = self.send(request, &target_url).await;
        let elapsed = started.elapsed();

        let (outcome, response) = match result {
            Ok(response) => {
                tracing::debug!(
                    url = %target_url,
                    status = response.status,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "local target responded"
                );
                (
                    DeliveryOutcome::responded(response.status, elapsed),
                    Some(response),
                )
            }
            Err(err) => {
                tracing::warn!(url = %target_url, %err, "forward failed");
                (DeliveryOutcome::failed(err.to_string(), elapsed), None)
            }
        };

        ForwardReport {
            method: request.method.to_ascii_uppercase(),
            path: request.display_path().to_string(),
            target_url,
            outcome,
            response,
        }
    }

    async fn send(
        &self,
        request: &WebhookRequest,
        url: &str,
    ) -> Result<ForwardedResponse, DeliveryError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| DeliveryError::InvalidMethod(request.method.clone()))?;

        let headers = to_header_map(&sanitize_headers(request.headers.as_ref()));

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = request.encoded_body() {
            builder = builder.body(body);
        }

        let response = builder.send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.bytes().await?.to_vec();

        Ok(ForwardedResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            content_type,
            content_length,
            body,
        })
    }
}

/// Flatten an error and its sources into one line; reqwest keeps the useful
/// part ("connection refused") in the source chain.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(value: serde_json::Value) -> WebhookRequest {
        serde_json::from_value(value).unwrap()
    }

    fn forwarder_for(server: &MockServer, override_path: Option<&str>) -> Forwarder {
        Forwarder::new(ForwarderConfig {
            target: ForwardTarget::new(
                Some(server.uri()),
                None,
                override_path.map(str::to_string),
            ),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn forwards_to_endpoint_default_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"ok": true})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let forwarder = forwarder_for(&server, None);
        let report = forwarder
            .forward(
                &request(json!({
                    "method": "POST",
                    "path": "/webhook/stripe",
                    "headers": {},
                    "body": {"ok": true}
                })),
                Some("/hook"),
            )
            .await;

        assert_eq!(report.target_url, format!("{}/hook", server.uri()));
        assert_eq!(report.method, "POST");
        assert_eq!(report.path, "/webhook/stripe");
        assert!(report.outcome.is_success());
        assert_eq!(report.outcome.status(), Some(200));
    }

    #[tokio::test]
    async fn stale_content_length_is_not_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/in"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let forwarder = forwarder_for(&server, Some("/in"));
        forwarder
            .forward(
                &request(json!({
                    "method": "post",
                    "headers": {"Content-Length": "9999", "X-Attempt": 2},
                    "body": "hello"
                })),
                None,
            )
            .await;

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        let req = &received[0];
        assert_eq!(req.headers.get("content-length").unwrap(), "5");
        assert_eq!(req.headers.get("x-attempt").unwrap(), "2");
        assert_eq!(req.body, b"hello");
    }

    #[tokio::test]
    async fn string_body_is_sent_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("a=1&b=2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let report = forwarder_for(&server, Some("form"))
            .forward(
                &request(json!({
                    "method": "PUT",
                    "headers": {"Content-Type": "application/x-www-form-urlencoded"},
                    "body": "a=1&b=2"
                })),
                None,
            )
            .await;
        assert!(report.outcome.is_success());
    }

    #[tokio::test]
    async fn non_2xx_is_data_not_a_fault() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let report = forwarder_for(&server, Some("missing"))
            .forward(&request(json!({"method": "POST"})), None)
            .await;

        assert!(!report.outcome.is_success());
        assert_eq!(report.outcome.status(), Some(404));
        let response = report.response.unwrap();
        assert_eq!(response.reason.as_deref(), Some("Not Found"));
        assert_eq!(response.body, b"nope");
    }

    #[tokio::test]
    async fn response_details_are_captured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"id": 7})),
            )
            .mount(&server)
            .await;

        let report = forwarder_for(&server, None)
            .forward(&request(json!({"method": "POST", "body": {}})), None)
            .await;

        let response = report.response.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(response.content_length, Some(response.body.len() as u64));
        assert_eq!(
            response.preview(),
            ResponsePreview::Json("{\n  \"id\": 7\n}".into())
        );
    }

    #[tokio::test]
    async fn refused_connection_is_a_failed_outcome() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let forwarder = Forwarder::new(ForwarderConfig {
            target: ForwardTarget::new(Some("http://127.0.0.1".into()), Some(port), None),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let report = forwarder
            .forward(&request(json!({"method": "POST", "body": {"ok": true}})), Some("/hook"))
            .await;

        assert!(!report.outcome.is_success());
        assert!(report.outcome.status().is_none());
        assert!(report.outcome.error().is_some());
        assert!(report.response.is_none());
    }

    #[tokio::test]
    async fn slow_target_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let forwarder = Forwarder::new(ForwarderConfig {
            target: ForwardTarget::new(Some(server.uri()), None, None),
            timeout: Duration::from_millis(100),
        })
        .unwrap();

        let report = forwarder
            .forward(&request(json!({"method": "POST"})), None)
            .await;

        assert!(report.outcome.error().is_some());
        assert!(report.outcome.elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn invalid_method_is_a_failed_outcome() {
        let server = MockServer::start().await;
        let report = forwarder_for(&server, None)
            .forward(&request(json!({"method": "NOT A METHOD"})), None)
            .await;

        assert_eq!(
            report.outcome.error(),
            Some("invalid HTTP method 'NOT A METHOD'")
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
