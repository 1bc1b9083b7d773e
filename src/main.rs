use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use pinned::auth::{OAuthProvider, SessionSettings, purge_expired};
use pinned::client::BookmarkClient;
use pinned::config::{Cli, Command, Config, default_config_dir, default_config_path};
use pinned::db::Database;
use pinned::handler::AppState;
use pinned::realtime::{ChangeFeed, LiveBookmarks};
use tokio::{signal, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const CLEANUP_INTERVAL_SECONDS: u64 = 300;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(args.config_path).await,
        Command::Watch { server, token } => watch(&server, &token).await,
    }
}

async fn watch(server: &str, token: &str) {
    let client = BookmarkClient::new(server, token).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup client");
        std::process::exit(1);
    });

    if let Err(e) = client.watch(print_list).await {
        tracing::error!(error = %pinned::unpack_error(&*e), "watch failed");
        std::process::exit(1);
    }
}

fn print_list(live: &LiveBookmarks) {
    println!("--- {} bookmark(s) ---", live.len());
    for bookmark in live.items() {
        println!("{}  {}  {}", bookmark.created_at, bookmark.title, bookmark.url);
    }
}

async fn serve(config_path: Option<String>) {
    // With --config, data lives next to the config file; otherwise in ~/.pinned/
    let (config_path, data_dir) = match config_path {
        Some(path) => {
            let path = PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."));
            (path, dir)
        }
        None => (default_config_path(), default_config_dir()),
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(error = %e, path = ?data_dir, "failed to create data directory");
        std::process::exit(1);
    }

    tracing::info!("pinned.svc starting");

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });
    let db = Arc::new(Database::new(&cfg.app, &data_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup database");
        std::process::exit(1);
    }));

    let provider = Arc::new(OAuthProvider::new(cfg.auth.clone(), cfg.app.redirect_uri()));
    let state = AppState {
        db: db.clone(),
        feed: ChangeFeed::default(),
        provider,
        sessions: SessionSettings {
            ttl_seconds: cfg.app.session_ttl_seconds,
            cookie_secure: cfg.app.cookie_secure,
        },
    };

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let cancellation_token = CancellationToken::new();
    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel::<()>(1);

    // Expired sessions and abandoned logins are purged every 5 minutes
    let cleanup_db = db.clone();
    let cleanup_token = cancellation_token.clone();
    let cleanup_done = shutdown_complete_tx.clone();
    tokio::spawn(async move {
        let _done = cleanup_done;
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(CLEANUP_INTERVAL_SECONDS));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match purge_expired(cleanup_db.connection(), Utc::now()).await {
                        Ok(0) => {}
                        Ok(purged) => tracing::info!(purged, "purged expired sessions"),
                        Err(e) => tracing::warn!("Failed to purge expired sessions: {}", e),
                    }
                    if let Err(e) = cleanup_db.sync().await {
                        tracing::warn!("Failed to sync replica: {}", e);
                    }
                }
                _ = cleanup_token.cancelled() => {
                    tracing::info!("Session cleanup task shutting down");
                    break;
                }
            }
        }
    });

    let app = pinned::router(state);

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("pinned.svc running on {}", &address);
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server stopped unexpectedly");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
            cancellation_token.cancel();
        }
    }

    drop(shutdown_complete_tx);
    shutdown_complete_rx.recv().await;
    tracing::info!("pinned.svc going off, graceful shutdown complete");
}
