use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use pagesync::app::{build_router, AppState};
use pagesync::auth::authorizer::TokenAuthorizer;
use pagesync::config::AppConfig;
use pagesync::db::page_repository::MongoPageRepository;
use pagesync::storage::file_store::FileStore;
use pagesync::sync::engine::sync_all_pages;
use pagesync::sync::throttle::SyncThrottle;

/// Page document sync server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file (defaults to `pagesync.toml` when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagesync=info,tower_http=info".into()),
        )
        .init();

    tracing::info!("Starting pagesync server...");

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    // Connect to MongoDB (the driver connects lazily)
    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb_uri)
        .await
        .context("Invalid MongoDB URI")?;
    let mongo_db = mongo_client.database(&config.mongodb_database);
    let page_repo = MongoPageRepository::new(&mongo_db);
    if let Err(e) = page_repo.ensure_indexes().await {
        tracing::warn!("Could not create page indexes, continuing: {e}");
    }

    tracing::info!("Using MongoDB database '{}'", config.mongodb_database);

    let file_store = FileStore::from_current_dir(config.content_dir.clone())?;
    tracing::info!(
        "Page mirrors searched in: {:?}",
        file_store.candidate_dirs()
    );

    let state = AppState {
        page_repo: Arc::new(page_repo),
        mirror: Arc::new(file_store),
        authorizer: Arc::new(TokenAuthorizer::from_config(&config)),
        sync_throttle: Arc::new(SyncThrottle::new(config.sync_ttl())),
    };

    // Reconcile both stores once before taking traffic
    let report = sync_all_pages(
        state.page_repo.as_ref(),
        state.mirror.as_ref(),
        &state.sync_throttle,
        chrono::Utc::now(),
    )
    .await;
    for page in &report.pages {
        match (&page.outcome, &page.error) {
            (Some(outcome), _) => tracing::info!(
                "Startup sync '{}': {:?} (mirrored: {})",
                page.slug,
                outcome,
                page.mirrored
            ),
            (None, Some(error)) => tracing::warn!("Startup sync '{}' failed: {}", page.slug, error),
            (None, None) => {}
        }
    }

    let app = build_router(state);

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
