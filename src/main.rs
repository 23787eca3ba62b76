mod bot;
mod config;
mod llm;
mod platform;
mod server;
#[cfg(test)]
mod testing;
mod vision;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Bot;
use crate::config::Config;
use crate::llm::LlmClient;
use crate::platform::telegram::TelegramClient;
use crate::vision::ResnetClassifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,plantbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Bind: {}", config.server.bind);
    info!("  Model: {} via {}", config.llm.model, config.llm.base_url);
    info!(
        "  Classifier: {} ({})",
        config.classifier.architecture,
        config.classifier.weights.display()
    );

    let classifier = ResnetClassifier::load(&config.classifier)
        .context("Failed to load image classifier")?;

    let mut http = reqwest::Client::builder();
    if let Some(secs) = config.http.timeout_secs {
        http = http.timeout(Duration::from_secs(secs));
    }
    let http = http.build().context("Failed to build HTTP client")?;

    let llm = LlmClient::new(config.llm.clone(), http.clone());
    let telegram = TelegramClient::new(config.telegram.clone(), http);

    if let Some(url) = &config.telegram.webhook_url {
        match telegram.set_webhook(url).await {
            Ok(()) => info!("Webhook registered at {}", url),
            Err(e) => warn!("Failed to register webhook at {}: {:#}", url, e),
        }
    }

    let bot = Arc::new(Bot::new(
        Arc::new(llm),
        Arc::new(classifier),
        Arc::new(telegram),
    ));

    info!("Bot is starting...");
    server::serve(config.server.bind, bot).await?;

    Ok(())
}
