//! Health Check API
//!
//! Provides health check endpoint for monitoring and load balancers.

use axum::{extract::State, response::Json};
use serde::Serialize;

use super::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status
    pub status: &'static str,
    /// Application version
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Whether an AI provider key is configured
    pub ai_configured: bool,
    /// Timestamp (ISO 8601)
    pub timestamp: String,
}

/// Health check handler
///
/// Returns 200 OK with health information.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        ai_configured: state.ai_configured,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
