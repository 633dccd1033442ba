use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The on-disk credential record written by `hooktunnel login`.
///
/// Fields the agent does not know about are kept in `extra` so that a
/// settings rewrite never drops data written by a newer client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub api_key: String,
    pub user: UserIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CredentialRecord {
    /// Create a freshly authenticated record stamped with the current UTC
    /// time in ISO-8601 form.
    pub fn new(api_key: impl Into<String>, user: UserIdentity) -> Self {
        Self {
            api_key: api_key.into(),
            user,
            authenticated_at: Some(
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            ),
            extra: Map::new(),
        }
    }
}

/// Identity of the authenticated user plus the settings object the relay
/// pushes with `userSettings` messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Raw settings object, stored verbatim so unknown keys round-trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
            settings: None,
            extra: Map::new(),
        }
    }

    /// Email when known, otherwise the user id.
    pub fn display_name(&self) -> &str {
        match self.email.as_deref() {
            Some(email) if !email.is_empty() => email,
            _ => &self.id,
        }
    }

    /// Typed view over the stored settings object.
    pub fn settings(&self) -> UserSettings {
        self.settings
            .as_ref()
            .map(UserSettings::from_value)
            .unwrap_or_default()
    }
}

/// Typed view over the user settings object.
///
/// Only the fields the agent acts on are modelled; the canonical copy stays
/// the raw JSON in [`UserIdentity::settings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserSettings {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub delivery_all_queued_webhooks_on_connection: bool,
    pub show_webhook_response_in_console: bool,
    pub dark_mode: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl UserSettings {
    /// Interpret a raw settings value. Each field is read independently: a
    /// missing, null or mistyped field takes its default without affecting
    /// the others.
    pub fn from_value(value: &Value) -> Self {
        let Some(fields) = value.as_object() else {
            tracing::warn!(kind = json_kind(value), "ignoring non-object user settings");
            return Self::default();
        };

        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_owned);
        let flag = |key: &str| fields.get(key).and_then(Value::as_bool).unwrap_or(false);

        Self {
            id: text("id"),
            user_id: text("userId"),
            delivery_all_queued_webhooks_on_connection: flag(
                "deliveryAllQueuedWebhooksOnConnection",
            ),
            show_webhook_response_in_console: flag("showWebhookResponseInConsole"),
            dark_mode: flag("darkMode"),
            created_at: text("createdAt"),
            updated_at: text("updatedAt"),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
