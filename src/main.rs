use std::sync::Arc;

use linkly_client::{
    notify::RecordingSink, storage::FileStore, ApiClient, ClientConfig, HealthMonitor,
    LinkSynchronizer, SessionManager,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod console;

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent, env vars may already be set)
    dotenvy::dotenv().ok();

    // Logs go to stderr so they don't interleave with the console on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkly_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::from_env()?;
    tracing::info!("Backend: {}", config.api_base_url);
    tracing::info!("Session file: {}", config.session_file.display());

    let api = ApiClient::new(&config)?;
    let toasts = RecordingSink::new();

    // Identity must be restored before anything trusts `is_authenticated`
    let session = Arc::new(SessionManager::new(
        api.clone(),
        Arc::new(FileStore::new(&config.session_file)),
        Arc::new(toasts.clone()),
    ));
    session.restore();

    let sync = Arc::new(LinkSynchronizer::new(
        api.clone(),
        Arc::clone(&session),
        Arc::new(toasts.clone()),
    ));
    let watcher = sync.watch_identity();

    let health = Arc::new(HealthMonitor::new(api, config.health_interval));
    let health_schedule = health.spawn();

    console::Console::new(session, sync, health, toasts)
        .run()
        .await?;

    health_schedule.shutdown();
    watcher.abort();
    tracing::info!("Bye");
    Ok(())
}
