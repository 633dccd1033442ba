use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;

use crate::api::ApiClient;
use crate::commands::{load_credentials, Context};

pub async fn run(ctx: &Context) -> Result<ExitCode> {
    let Some(record) = load_credentials(&ctx.credentials)? else {
        return Ok(ExitCode::FAILURE);
    };

    let api = ApiClient::new(&ctx.config.api.url)?;
    let endpoints = match api.list_endpoints(&record.api_key).await {
        Ok(endpoints) => endpoints,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "endpoint listing failed");
            eprintln!("{}", "Failed to fetch endpoints.".red());
            return Ok(ExitCode::FAILURE);
        }
    };

    println!("{}", "📋 Your hooktunnel Endpoints\n".blue());

    for (index, endpoint) in endpoints.iter().enumerate() {
        let marker = if endpoint.is_active() {
            "●".green()
        } else {
            "○".bright_black()
        };
        println!("{}. {marker} {}", index + 1, endpoint.name.bold());
        println!("   Slug: {}", endpoint.slug);
        println!(
            "   URL: {}",
            endpoint.relay_url.as_deref().unwrap_or("-").cyan()
        );
        println!("   Webhooks today: {}", endpoint.webhooks_today());
        println!();
    }

    println!(
        "{}",
        "Tip: Use 'hooktunnel connect --endpoint <slug>' to connect to a specific endpoint"
            .bright_black()
    );
    Ok(ExitCode::SUCCESS)
}
