use local_forwarder::WebhookRequest;
use serde::Deserialize;
use serde_json::Value;

/// `type` values this agent understands. Anything else decodes to
/// [`InboundMessage::Unknown`].
const KNOWN_TYPES: &[&str] = &["connected", "webhook", "userSettings", "pong"];

/// A frame that could not be turned into an [`InboundMessage`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("message has no string `type` field")]
    MissingType,

    #[error("invalid `{kind}` message: {source}")]
    InvalidShape {
        kind: String,
        source: serde_json::Error,
    },
}

/// Messages pushed by the relay, discriminated by their `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Handshake acknowledgement carrying the relay-assigned session id.
    #[serde(rename = "connected")]
    Connected {
        #[serde(rename = "connectionId", default)]
        connection_id: Option<String>,
    },

    /// A webhook to forward to the local target.
    #[serde(rename = "webhook")]
    Webhook {
        data: WebhookRequest,
        #[serde(default)]
        endpoint: Option<EndpointInfo>,
    },

    /// The user's settings changed on the server.
    #[serde(rename = "userSettings")]
    SettingsUpdate {
        #[serde(default)]
        data: Option<Value>,
    },

    /// Reply to our keep-alive ping.
    #[serde(rename = "pong")]
    Pong {},

    /// A `type` this agent does not know. Never produced by serde directly.
    #[serde(skip)]
    Unknown { kind: String },
}

/// The relay endpoint a webhook arrived on.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EndpointInfo {
    /// Default forwarding path configured on the endpoint.
    #[serde(rename = "targetUrl", default)]
    pub target_url: Option<String>,
}

impl InboundMessage {
    /// Decode one frame.
    ///
    /// Unrecognised `type` values are not an error: they decode to
    /// [`InboundMessage::Unknown`] so newer relays degrade gracefully.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(frame).map_err(DecodeError::Malformed)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?
            .to_string();

        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Ok(Self::Unknown { kind });
        }

        serde_json::from_value(value).map_err(|source| DecodeError::InvalidShape { kind, source })
    }
}

/// Messages the agent sends to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundMessage {
    Ping,
}

impl OutboundMessage {
    /// Wire form of the message.
    pub fn frame(&self) -> String {
        match self {
            Self::Ping => serde_json::json!({ "type": "ping" }).to_string(),
        }
    }
}
