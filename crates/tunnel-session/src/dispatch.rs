use std::sync::Arc;

use credential_store::{CredentialStore, SettingsUpdate, UserSettings};
use local_forwarder::{DeliveryOutcome, Forwarder, WebhookRequest};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::message::{EndpointInfo, InboundMessage};
use crate::observer::{ErrorKind, SessionObserver};
use crate::stats::StatsWindow;

/// What handling one inbound frame amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    Connected(Option<String>),
    Delivered(DeliveryOutcome),
    Settings(Option<SettingsUpdate>),
    Pong,
    Unknown(String),
    /// The frame could not be decoded.
    Rejected,
}

/// Routes decoded relay messages to their handlers.
///
/// Frames are handled one at a time; a webhook's forward is awaited before
/// the next frame is looked at, so stats and console output follow receipt
/// order.
pub struct Dispatcher {
    forwarder: Forwarder,
    credentials: Option<CredentialStore>,
    show_responses: bool,
    observer: Arc<dyn SessionObserver>,
}

impl Dispatcher {
    pub fn new(forwarder: Forwarder, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            forwarder,
            credentials: None,
            show_responses: false,
            observer,
        }
    }

    /// Persist settings pushed by the relay into `store`.
    pub fn with_credentials(mut self, store: CredentialStore) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Seed the in-memory settings the session starts with.
    pub fn with_settings(mut self, settings: &UserSettings) -> Self {
        self.show_responses = settings.show_webhook_response_in_console;
        self
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    /// Whether response bodies are currently shown.
    pub fn show_responses(&self) -> bool {
        self.show_responses
    }

    pub async fn dispatch(&mut self, frame: &[u8], stats: &mut StatsWindow) -> Dispatched {
        let message = match InboundMessage::decode(frame) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(%err, len = frame.len(), "dropping undecodable frame");
                self.observer.on_error(ErrorKind::Decode, &err.to_string());
                return Dispatched::Rejected;
            }
        };

        match message {
            InboundMessage::Connected { connection_id } => {
                tracing::info!(session_id = ?connection_id, "relay session established");
                if let Some(id) = connection_id.as_deref() {
                    self.observer.on_session_assigned(id);
                }
                Dispatched::Connected(connection_id)
            }
            InboundMessage::Webhook { data, endpoint } => {
                let outcome = self.deliver(&data, endpoint.as_ref()).await;
                stats.record(&outcome);
                Dispatched::Delivered(outcome)
            }
            InboundMessage::SettingsUpdate { data } => Dispatched::Settings(self.apply_settings(data)),
            InboundMessage::Pong {} => {
                tracing::trace!("pong");
                Dispatched::Pong
            }
            InboundMessage::Unknown { kind } => {
                tracing::warn!(%kind, "unknown message type from relay");
                self.observer.on_unknown_message(&kind);
                Dispatched::Unknown(kind)
            }
        }
    }

    async fn deliver(
        &self,
        request: &WebhookRequest,
        endpoint: Option<&EndpointInfo>,
    ) -> DeliveryOutcome {
        let endpoint_default = endpoint.and_then(|e| e.target_url.as_deref());
        let target_url = self.forwarder.resolve_url(endpoint_default);

        let span = tracing::info_span!(
            "delivery",
            delivery_id = %Uuid::new_v4(),
            method = %request.method,
            path = %request.display_path(),
        );

        self.observer.on_delivery_started(request, &target_url);

        let report = self
            .forwarder
            .forward(request, endpoint_default)
            .instrument(span)
            .await;

        self.observer.on_delivery(&report);
        if self.show_responses {
            if let Some(response) = &report.response {
                self.observer.on_response_preview(&response.preview());
            }
        }

        report.outcome
    }

    /// Apply relay-pushed settings: refresh what this session acts on, then
    /// write them to the credential file if they changed.
    fn apply_settings(&mut self, data: Option<Value>) -> Option<SettingsUpdate> {
        let settings = match data {
            Some(Value::Null) | None => {
                tracing::debug!("settings message without data");
                return None;
            }
            Some(settings) => settings,
        };

        self.show_responses = UserSettings::from_value(&settings).show_webhook_response_in_console;

        let store = self.credentials.as_ref()?;
        match store.update_user_settings(&settings) {
            Ok(SettingsUpdate::Written) => {
                self.observer.on_settings_updated();
                Some(SettingsUpdate::Written)
            }
            Ok(SettingsUpdate::Unchanged) => Some(SettingsUpdate::Unchanged),
            Err(err) => {
                tracing::warn!(%err, "failed to persist user settings");
                self.observer.on_error(ErrorKind::SettingsPersist, &err.to_string());
                None
            }
        }
    }
}
