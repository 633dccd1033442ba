use std::process::ExitCode;

use anyhow::{Context as _, Result};
use colored::Colorize;
use credential_store::CredentialRecord;

use crate::api::ApiClient;
use crate::cli::LoginArgs;
use crate::commands::Context;

const API_KEY_PREFIX: &str = "whl_";

pub fn has_valid_format(api_key: &str) -> bool {
    api_key.starts_with(API_KEY_PREFIX)
}

pub async fn run(args: LoginArgs, ctx: &Context) -> Result<ExitCode> {
    println!("{}", "🔐 hooktunnel Login".blue());
    println!("Enter your API key to authenticate\n");
    println!(
        "{}",
        "Generate an API key at: https://hooktunnel.dev/dashboard/api-keys\n".bright_black()
    );

    let api_key = match args.api_key {
        Some(key) => key,
        None => tokio::task::spawn_blocking(|| rpassword::prompt_password("API Key: "))
            .await
            .context("API key prompt panicked")?
            .context("failed to read API key")?,
    };
    let api_key = api_key.trim().to_string();

    if !has_valid_format(&api_key) {
        eprintln!(
            "{}",
            format!("❌ Invalid API key format (should start with '{API_KEY_PREFIX}')").red()
        );
        return Ok(ExitCode::FAILURE);
    }

    let api = ApiClient::new(&ctx.config.api.url)?;
    let user = match api.verify(&api_key).await {
        Ok(user) => user,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "login failed");
            eprintln!("{} {err}", "❌ Authentication failed:".red());
            println!("{}", "\nTroubleshooting:".yellow());
            println!("1. Make sure you copied the full API key");
            println!("2. Generate a new key at https://hooktunnel.dev/dashboard/api-keys");
            println!("3. Check that the key hasn't been revoked");
            return Ok(ExitCode::FAILURE);
        }
    };

    let greeting = user.display_name().to_string();
    ctx.credentials
        .save(&CredentialRecord::new(api_key, user))
        .with_context(|| {
            format!(
                "failed to save credentials to {}",
                ctx.credentials.path().display()
            )
        })?;

    println!("{}", "✅ Successfully authenticated!".green());
    println!("{}", format!("Welcome, {greeting}!").bright_black());
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use credential_store::CredentialStore;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(dir: &TempDir, api_url: String) -> Context {
        let mut config = AgentConfig::default();
        config.api.url = api_url;
        Context {
            config,
            credentials: CredentialStore::new(dir.path().join(".hooktunnel").join("config.json")),
        }
    }

    #[test]
    fn key_prefix() {
        assert!(has_valid_format("whl_abc123"));
        assert!(!has_valid_format("sk_live_abc"));
        assert!(!has_valid_format(""));
    }

    #[tokio::test]
    async fn successful_login_writes_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {"id": "u1", "email": "dev@example.com"}
            })))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, server.uri());
        let args = LoginArgs {
            api_key: Some("  whl_good \n".into()),
        };

        let code = run(args, &ctx).await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);

        let record = ctx.credentials.load().unwrap();
        assert_eq!(record.api_key, "whl_good");
        assert_eq!(record.user.id, "u1");
        assert!(record.authenticated_at.is_some());
    }

    #[tokio::test]
    async fn malformed_key_is_rejected_before_any_request() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, server.uri());

        let code = run(LoginArgs { api_key: Some("nope".into()) }, &ctx)
            .await
            .unwrap();

        assert_eq!(code, ExitCode::FAILURE);
        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(!ctx.credentials.exists());
    }

    #[tokio::test]
    async fn rejected_key_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, server.uri());

        let code = run(LoginArgs { api_key: Some("whl_revoked".into()) }, &ctx)
            .await
            .unwrap();

        assert_eq!(code, ExitCode::FAILURE);
        assert!(!ctx.credentials.exists());
    }
}
