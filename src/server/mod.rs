pub mod cors;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::io::StagingDir;
use crate::llm::AnalysisBackend;
use crate::models::SourceFormat;
use crate::stages::PipelineSettings;

pub use cors::{cors_layer, origin_allowed};

/// Per-process state shared by every request
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn AnalysisBackend>,
    pub staging: StagingDir,
    pub settings: PipelineSettings,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        staging: StagingDir,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            backend,
            staging,
            settings,
        }
    }
}

/// One `POST` route per source format, all served by the same handler
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = Router::new().route("/health", get(handlers::health));

    for format in SourceFormat::ALL {
        router = router.route(
            format.route(),
            post(
                move |state: State<AppState>,
                      multipart: Result<Multipart, MultipartRejection>| {
                    handlers::analyze(state, format, multipart)
                },
            ),
        );
    }

    router
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(config.allowed_origins.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(config: ServerConfig, backend: Arc<dyn AnalysisBackend>) -> Result<()> {
    let state = AppState::new(
        backend,
        StagingDir::new(&config.upload_dir),
        config.pipeline.clone(),
    );
    let app = build_router(state, &config);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
