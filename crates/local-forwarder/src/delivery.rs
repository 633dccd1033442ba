use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Path shown for deliveries whose origin request carried none.
pub const DEFAULT_DISPLAY_PATH: &str = "/webhook";

/// The origin request as captured by the relay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookRequest {
    pub method: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub headers: Option<Map<String, Value>>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl WebhookRequest {
    /// Path the relay received the webhook on, for display.
    pub fn display_path(&self) -> &str {
        match self.path.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ => DEFAULT_DISPLAY_PATH,
        }
    }

    /// Encode the body for the local request.
    ///
    /// Strings are sent verbatim, any other JSON value is serialised, and an
    /// absent or `null` body sends nothing.
    pub fn encoded_body(&self) -> Option<Vec<u8>> {
        match self.body.as_ref()? {
            Value::Null => None,
            Value::String(s) => Some(s.clone().into_bytes()),
            other => Some(other.to_string().into_bytes()),
        }
    }
}

/// How a forwarding attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// The local target answered with this status code.
    Status(u16),
    /// The request never got a response (DNS, refused, timeout, ...).
    Error(String),
}

/// Result of one forwarding attempt. Feeds the stats window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub elapsed: Duration,
    pub result: DeliveryResult,
}

impl DeliveryOutcome {
    pub fn responded(status: u16, elapsed: Duration) -> Self {
        Self {
            elapsed,
            result: DeliveryResult::Status(status),
        }
    }

    pub fn failed(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            elapsed,
            result: DeliveryResult::Error(error.into()),
        }
    }

    /// A 2xx status is a success; anything else, including transport
    /// failures, is not.
    pub fn is_success(&self) -> bool {
        matches!(self.result, DeliveryResult::Status(status) if (200..300).contains(&status))
    }

    pub fn status(&self) -> Option<u16> {
        match self.result {
            DeliveryResult::Status(status) => Some(status),
            DeliveryResult::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.result {
            DeliveryResult::Status(_) => None,
            DeliveryResult::Error(err) => Some(err),
        }
    }
}
