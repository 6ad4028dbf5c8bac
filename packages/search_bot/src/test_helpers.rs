use std::sync::Arc;

use crate::AppState;
use crate::bridge::IngestionBridge;
use crate::config::{RuntimeConfig, SearchConfig};
use crate::db::Database;
use crate::metrics::ServerMetrics;
use crate::repository::ContentRepository;
use crate::router::CommandRouter;
use crate::runtime::BotRuntime;
use crate::search::SearchEngine;
use crate::telegram::testing::RecordingTransport;

pub const TEST_WEBHOOK_SECRET: &str = "test-hook-token";

/// Build a fully-wired `AppState` backed by an in-memory SQLite database and
/// a recording transport. The bot runtime is left uninitialized; tests that
/// need it running call `initialize` and `start` themselves.
pub async fn test_app_state() -> (AppState, Arc<RecordingTransport>) {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");

    crate::db::run_migrations(&pool).await.expect("migrations");

    let db = Arc::new(Database { pool: pool.clone() });
    let repository = Arc::new(ContentRepository::new(pool));
    let metrics = Arc::new(ServerMetrics::new());
    let transport = Arc::new(RecordingTransport::default());

    let search = SearchEngine::new(repository.clone(), SearchConfig::default());
    let router = Arc::new(CommandRouter::new(
        repository,
        search,
        Some(-1001918569531),
        metrics.clone(),
    ));
    let runtime = Arc::new(BotRuntime::new(
        RuntimeConfig::default(),
        router,
        transport.clone(),
        metrics.clone(),
    ));

    let state = AppState {
        db,
        bridge: IngestionBridge::new(runtime.clone(), metrics.clone()),
        webhook_secret: Arc::from(TEST_WEBHOOK_SECRET),
        runtime,
        metrics,
    };

    (state, transport)
}
