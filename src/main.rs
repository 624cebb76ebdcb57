use anyhow::Context as AnyhowContext;
use chronicle::archiver::{Archiver, StopReason};
use chronicle::config::Config;
use chronicle::db::Database;
use chronicle::discord::DiscordSource;
use chronicle::store::MessageStore;
use serenity::http::Http;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chronicle=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);

    let db = Database::new(&config).context("Failed to open database")?;
    let result = match db.execute_init() {
        Ok(()) => archive(&config, &db).await,
        Err(e) => Err(anyhow::Error::new(e).context("Failed to initialize database")),
    };

    // Partial batches are replayable from the cursor, so nothing is flushed here.
    if let Err(e) = db.close() {
        error!("Failed to close database: {}", e);
    }

    if let Err(e) = &result {
        error!("Archiving failed: {:#}", e);
    }
    result
}

async fn archive(config: &Config, db: &Database) -> anyhow::Result<()> {
    let http = Arc::new(Http::new(&config.discord_token));
    let me = http
        .get_current_user()
        .await
        .context("Failed to log in to Discord")?;
    info!("Logged in as {}", me.tag());

    let channel = DiscordSource::resolve_channel(&http, config.channel_id).await?;
    info!("Target channel: {} ({})", channel.name, channel.id);
    let channel_id = channel.id.to_string();

    let store = Arc::new(db.clone());
    let existing = store.count(&channel_id).await?;
    info!("Channel {} has {} archived messages", channel_id, existing);

    let source = Arc::new(DiscordSource::new(http, channel.guild_id));
    let archiver = Archiver::new(source, store.clone(), store, config.archiver_options());

    tokio::select! {
        result = archiver.run(&channel_id) => {
            let report = result?;
            match report.stop {
                StopReason::Exhausted => info!("Channel history exhausted at pivot {}", report.last_pivot),
                StopReason::CutoffReached { message_id } => {
                    info!("Cutoff reached at message {}", message_id)
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
