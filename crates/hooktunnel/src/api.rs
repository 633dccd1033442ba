use anyhow::{bail, Context, Result};
use credential_store::UserIdentity;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the hooktunnel account API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    user: Option<VerifiedUser>,
}

#[derive(Debug, Deserialize)]
struct VerifiedUser {
    #[serde(default)]
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// One relay endpoint as returned by the listing API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoint {
    pub name: String,
    pub slug: String,
    pub status: Option<String>,
    pub relay_url: Option<String>,
    pub webhooks: Option<Value>,
}

impl Endpoint {
    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }

    /// Number of entries in `webhooks`, zero when it is not an array.
    pub fn webhooks_today(&self) -> usize {
        match &self.webhooks {
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("hooktunnel/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Exchange an API key for the identity it belongs to.
    pub async fn verify(&self, api_key: &str) -> Result<UserIdentity> {
        let url = format!("{}/auth/verify", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, "API key rejected");
            bail!("Invalid API key");
        }

        let body: VerifyResponse = response.json().await.context("Invalid API key")?;
        let Some(user) = body.user else {
            bail!("Invalid API key");
        };

        tracing::info!(user_id = %user.id, "API key verified");
        Ok(UserIdentity::new(user.id, user.email))
    }

    pub async fn list_endpoints(&self, api_key: &str) -> Result<Vec<Endpoint>> {
        let url = format!("{}/api/lab/endpoints", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("endpoint listing returned {status}");
        }

        response
            .json()
            .await
            .context("endpoint listing was not a JSON array of endpoints")
    }
}
