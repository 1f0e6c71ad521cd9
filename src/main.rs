use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizhub::{
    config::Config,
    repository::MemoryRepository,
    state::{export::StateSnapshot, AppState},
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizhub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quizhub...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let repo = match &config.state_file {
        Some(path) if path.exists() => match StateSnapshot::load_from_file(path) {
            Ok(snapshot) => {
                tracing::info!(
                    "Restored {} games and {} players from {}",
                    snapshot.games.len(),
                    snapshot.players.len(),
                    path.display()
                );
                snapshot.into_memory_repository()
            }
            Err(e) => {
                tracing::error!("Refusing to start with a bad state file: {}", e);
                std::process::exit(1);
            }
        },
        _ => MemoryRepository::new(),
    };

    let state = Arc::new(
        AppState::with_repository(Box::new(repo))
            .with_outbox_capacity(config.outbox_capacity)
            .with_write_timeout(config.write_timeout),
    );

    if config.allowed_origins.is_empty() {
        tracing::warn!("No QUIZHUB_ALLOWED_ORIGINS set, accepting sockets from any origin");
    }

    let app = quizhub::router(state.clone(), &config);

    let addr = config.socket_addr();
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    if let Some(path) = &config.state_file {
        match state.export_state().await.save_to_file(path) {
            Ok(()) => tracing::info!("State saved to {}", path.display()),
            Err(e) => tracing::error!("{}", e),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
