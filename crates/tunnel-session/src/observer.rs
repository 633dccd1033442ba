use std::fmt;

use local_forwarder::{ForwardReport, ResponsePreview, WebhookRequest};

use crate::stats::StatsSummary;

/// Category of a failure reported through [`SessionObserver::on_error`].
///
/// Delivery failures are not listed here: they arrive through
/// [`SessionObserver::on_delivery`] as failed outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An inbound frame could not be decoded. The session continues.
    Decode,
    /// The relay connection could not be opened or broke. Fatal.
    Transport,
    /// A settings update could not be written to disk. The session continues.
    SettingsPersist,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode => write!(f, "decode"),
            Self::Transport => write!(f, "transport"),
            Self::SettingsPersist => write!(f, "settings-persist"),
        }
    }
}

/// What the session is connected as and where it forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDetails {
    pub user_id: String,
    /// Endpoint filter, `None` when listening to all endpoints.
    pub endpoint: Option<String>,
    /// `host[:port]` of the local target.
    pub forward_base: String,
    /// Operator path override, without its leading `/`.
    pub path_override: Option<String>,
}

/// How the relay connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code; `None` when the peer sent none.
    pub code: Option<u16>,
    pub reason: Option<String>,
    /// `true` when the close was initiated by an operator interrupt.
    pub interrupted: bool,
}

/// Presentation hooks invoked by the session.
///
/// Every method is called synchronously from the session's event loop, in
/// the order events happen, so implementations see deliveries in receipt
/// order. Implementations must not block.
pub trait SessionObserver: Send + Sync {
    /// The relay accepted the connection.
    fn on_connect(&self, _details: &ConnectionDetails) {}

    /// The relay assigned a session id.
    fn on_session_assigned(&self, _session_id: &str) {}

    /// A webhook is about to be forwarded.
    fn on_delivery_started(&self, _request: &WebhookRequest, _target_url: &str) {}

    /// A forward finished, successfully or not.
    fn on_delivery(&self, _report: &ForwardReport) {}

    /// Detailed response body, only when the user enabled it in settings.
    fn on_response_preview(&self, _preview: &ResponsePreview) {}

    /// New user settings were written to the credential file.
    fn on_settings_updated(&self) {}

    /// The relay sent a message type this agent does not know.
    fn on_unknown_message(&self, _kind: &str) {}

    /// Periodic summary, emitted only once at least one delivery happened.
    fn on_stats_tick(&self, _summary: &StatsSummary) {}

    fn on_error(&self, _kind: ErrorKind, _detail: &str) {}

    /// The operator asked to stop; the connection is closing.
    fn on_shutdown_requested(&self) {}

    /// The connection closed. `summary` is the final stats summary.
    fn on_disconnect(&self, _close: &CloseInfo, _summary: &StatsSummary) {}
}
