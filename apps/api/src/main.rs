use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ai_consultation_cell::OpenAiChatClient;
use healthbook_api::create_router;
use shared_config::{AppConfig, StorageBackend};
use shared_database::{MemoryStore, PostgrestStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting HealthBook API server");

    let config = AppConfig::from_env();

    let repos = match config.storage_backend {
        StorageBackend::Supabase => PostgrestStore::repositories(&config),
        StorageBackend::Memory => {
            warn!("Using in-memory storage, data is lost on restart");
            MemoryStore::repositories()
        }
    };

    if !config.is_ai_configured() {
        warn!("OpenAI is not configured, AI consultations will fail");
    }
    let llm = Arc::new(OpenAiChatClient::new(&config));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(&config, repos, llm)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
