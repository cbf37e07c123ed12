mod handlers;
mod metrics;
mod routes;
mod sessions;

use anyhow::{Context, Result};
use axum::Router;
use redis::aio::ConnectionManager;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use verdict_common::config::Config;
use verdict_engine::client::ExecutionClient;
use verdict_engine::config::LanguageConfigManager;
use verdict_engine::judge0::Judge0Client;
use verdict_engine::region::MarkerRegionCodec;
use verdict_engine::session::ExerciseSession;
use verdict_engine::snapshot::{MemorySnapshotStore, RedisSnapshotStore, SnapshotStore};

use crate::sessions::SessionRegistry;

pub struct AppState {
    pub client: Arc<dyn ExecutionClient>,
    /// Snapshots go to Redis when configured, otherwise stay in process
    pub redis: Option<ConnectionManager>,
    pub codec: MarkerRegionCodec,
    sessions: Arc<SessionRegistry>,
}

impl AppState {
    fn snapshot_store(&self, session_id: &str) -> Arc<dyn SnapshotStore> {
        match &self.redis {
            Some(conn) => Arc::new(RedisSnapshotStore::new(conn.clone(), session_id)),
            None => Arc::new(MemorySnapshotStore::new()),
        }
    }

    /// Session for `session_id`, created on first use
    pub async fn session(&self, session_id: &str) -> Arc<ExerciseSession> {
        self.sessions
            .get_or_create(session_id, || {
                ExerciseSession::new(self.client.clone(), self.snapshot_store(session_id))
            })
            .await
    }

    pub async fn existing_session(&self, session_id: &str) -> Option<Arc<ExerciseSession>> {
        self.sessions.get(session_id).await
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Verdict API booting...");

    let config = Config::from_env();

    let languages = match LanguageConfigManager::load(Path::new(&config.languages_config)) {
        Ok(languages) => {
            info!(languages = ?languages.list_languages(), "Loaded language configuration");
            languages
        }
        Err(e) => {
            warn!(error = %e, "Using built-in Judge0 language ids");
            LanguageConfigManager::default()
        }
    };

    let client = Judge0Client::new(&config, languages).context("Failed to build Judge0 client")?;
    info!(judge0_url = %config.judge0_url, "Execution backend configured");

    let redis = match &config.redis_url {
        Some(url) => {
            let redis_client = redis::Client::open(url.as_str()).context("Failed to create Redis client")?;
            let conn = ConnectionManager::new(redis_client)
                .await
                .context("Failed to connect to Redis")?;
            info!("Connected to Redis: {}", url);
            Some(conn)
        }
        None => {
            warn!("REDIS_URL not set, snapshots are kept in memory");
            None
        }
    };

    metrics::init_metrics();

    let registry = Arc::new(SessionRegistry::new(config.session_idle_ttl, config.max_sessions));
    sessions::spawn_sweeper(
        registry.clone(),
        (registry.idle_ttl() / 4).max(std::time::Duration::from_secs(1)),
    );
    info!(
        idle_ttl_secs = config.session_idle_ttl.as_secs(),
        max_sessions = config.max_sessions,
        "Session eviction configured"
    );

    let state = Arc::new(AppState {
        client: Arc::new(client),
        redis,
        codec: MarkerRegionCodec,
        sessions: registry,
    });

    let app = Router::new()
        .merge(routes::routes())
        .with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("HTTP server listening on {}", config.bind_addr);
    info!("Ready to grade");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
