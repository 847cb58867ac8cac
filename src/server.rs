//! HTTP Server
//!
//! Axum server with CORS on the API, security headers, request tracing,
//! optional static frontend serving, and graceful shutdown.

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::api::{api_router, AppState};
use crate::config::Config;

/// How often idle rate-limit entries are dropped
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// API server
pub struct Server {
    config: Config,
    state: AppState,
}

impl Server {
    pub fn new(config: Config, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the router with all routes and middleware
    pub fn build_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(
                self.config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse::<HeaderValue>().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

        let mut router = Router::new().nest("/api", api_router(self.state.clone()).layer(cors));

        // Everything else is the single-page frontend
        if let Some(dir) = &self.config.static_dir {
            let index = ServeFile::new(dir.join("index.html"));
            router = router.fallback_service(ServeDir::new(dir).fallback(index));
        }

        router
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("SAMEORIGIN"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                HeaderName::from_static("x-xss-protection"),
                HeaderValue::from_static("1; mode=block"),
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Start the server and run until shutdown signal
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.socket_addr();
        let router = self.build_router();

        if let Some(limits) = self.state.limits.clone() {
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
                loop {
                    interval.tick().await;
                    limits.cleanup().await;
                }
            });
        } else {
            warn!("Rate limiting disabled");
        }

        match &self.config.static_dir {
            Some(dir) => info!("Serving frontend from {}", dir.display()),
            None => info!("No STATIC_DIR set - serving API only"),
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on {}", self.config.base_url());

        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server shut down gracefully");
        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
