use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod bridge;
mod config;
mod db;
mod error;
mod handlers;
mod metrics;
mod models;
mod repository;
mod router;
mod runtime;
mod search;
mod telegram;
#[cfg(test)]
mod test_helpers;

use crate::bridge::IngestionBridge;
use crate::config::{BotConfig, DataDirs, FileConfig};
use crate::db::Database;
use crate::metrics::ServerMetrics;
use crate::repository::ContentRepository;
use crate::router::CommandRouter;
use crate::runtime::BotRuntime;
use crate::search::SearchEngine;
use crate::telegram::TelegramClient;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "search-bot")]
#[command(about = "Keyword search bot for one authorized group chat")]
struct Cli {
    /// Custom data directory (defaults to ~/.search-bot)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Port for the web server (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub db: Arc<Database>,
    /// Bot runtime, owned here so handlers can report its state
    pub runtime: Arc<BotRuntime>,
    pub bridge: IngestionBridge,
    /// Required in `X-Telegram-Bot-Api-Secret-Token` on `POST /webhook`
    pub webhook_secret: Arc<str>,
    /// Pipeline metrics for observability
    pub metrics: Arc<ServerMetrics>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "search_bot=debug,tower_http=debug,info"
    } else {
        "search_bot=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting search bot");

    let dirs = DataDirs::new(cli.data_dir)?;
    if !dirs.config_toml_path().exists() {
        info!(
            "No config file at {}, using defaults and environment",
            dirs.config_toml_path().display()
        );
    }

    let file_config: FileConfig = config::load_config(&dirs.data_dir)
        .extract()
        .context("Failed to load configuration")?;
    let mut bot_config = BotConfig::from_file(&file_config)?;
    if let Some(port) = cli.port {
        bot_config.port = port;
    }

    // Initialize database
    info!("Initializing database...");
    let db = Arc::new(Database::new(&dirs).await?);
    let stats = db.get_stats().await?;
    info!(
        "Database holds {} records from {} users ({} KB)",
        stats.records,
        stats.owners,
        stats.database_size_bytes / 1024
    );

    let repository = Arc::new(ContentRepository::new(db.pool.clone()));
    let metrics = Arc::new(ServerMetrics::new());

    match bot_config.authorized_chat_id {
        Some(chat_id) => info!("Answering chat {} only", chat_id),
        None => warn!("chat.authorized_chat_id is not set, every chat may use the bot"),
    }

    let transport = Arc::new(
        TelegramClient::new(&bot_config.api_base, &bot_config.token)?
            .with_webhook_secret(bot_config.webhook_secret.clone()),
    );
    let search = SearchEngine::new(repository.clone(), bot_config.search.clone());
    let router = Arc::new(CommandRouter::new(
        repository,
        search,
        bot_config.authorized_chat_id,
        metrics.clone(),
    ));
    let runtime = Arc::new(BotRuntime::new(
        bot_config.runtime.clone(),
        router,
        transport,
        metrics.clone(),
    ));
    runtime.initialize()?;

    let app_state = AppState {
        db,
        runtime: runtime.clone(),
        bridge: IngestionBridge::new(runtime.clone(), metrics.clone()),
        webhook_secret: Arc::from(bot_config.webhook_secret.as_str()),
        metrics,
    };

    let app = Router::new()
        .route("/", get(handlers::index_handler))
        .route("/webhook", post(handlers::webhook_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/health/ready", get(handlers::health_ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .with_state(app_state);

    let addr = format!("{}:{}", bot_config.host, bot_config.port)
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid listen address {}:{}", bot_config.host, bot_config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    // The listener is bound, so the provider can reach us once it accepts
    // the webhook
    if let Err(e) = runtime.start(&bot_config.webhook_url).await {
        error!("Could not register webhook: {}", e);
        runtime.shutdown().await;
        return Err(e).context("Webhook registration failed");
    }

    info!("Search bot listening on http://{}", actual_addr);
    info!("  POST /webhook       - update intake");
    info!("  GET  /health/ready  - readiness");
    info!("  GET  /metrics       - counters");

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    info!("Stopping bot runtime...");
    runtime.shutdown().await;

    info!("Shutdown complete");
    server_result
}
