use std::sync::Arc;

use anyhow::Context;

use sticker_bot::channels::{ChatTransport, TelegramChannel};
use sticker_bot::config::BotConfig;
use sticker_bot::directory::{DirectoryClient, IdentityDirectory};
use sticker_bot::registration::{Dispatcher, RegistrationEngine};
use sticker_bot::store::{LibSqlBackend, ProfileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("loading configuration")?;

    eprintln!("🤖 Sticker Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Images: {}", config.flow.images_dir.display());
    eprintln!("   Gate channel: {}", config.flow.subscription_channel);
    eprintln!(
        "   Order destinations: {}",
        config
            .flow
            .notify_destinations
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let missing = config.directory.missing_secrets();
    if !missing.is_empty() {
        tracing::warn!(
            missing = %missing.join(", "),
            "Directory credentials not set; every handle lookup will fail"
        );
    }

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn ProfileStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("opening database at {}", config.db_path.display()))?,
    );

    // ── Telegram ─────────────────────────────────────────────────────────
    let telegram = Arc::new(TelegramChannel::new(config.bot_token.clone()));
    telegram
        .health_check()
        .await
        .context("Telegram getMe failed; check BOT_TOKEN")?;
    let events = telegram.start();
    let transport: Arc<dyn ChatTransport> = telegram;

    // ── Directory ────────────────────────────────────────────────────────
    let directory: Arc<dyn IdentityDirectory> =
        Arc::new(DirectoryClient::new(config.directory.clone()));

    // ── Registration flow ────────────────────────────────────────────────
    let engine = Arc::new(RegistrationEngine::new(
        config.flow.clone(),
        store,
        directory,
        transport,
    ));
    let dispatcher = Dispatcher::new(engine, config.worker_idle_timeout);

    dispatcher.run(events).await;

    tracing::info!("Sticker bot stopped");
    Ok(())
}
