//! HTTP API
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  POST   /api/auth/signup   → create account  │
//! │  POST   /api/auth/login    → bearer token    │
//! │  GET    /api/auth/me       → current user    │
//! │  POST   /api/explain       → AI explanation  │
//! │  POST   /api/mcq           → AI quiz         │
//! │  POST   /api/mcq/score     → record score    │
//! │  GET    /api/history       → own history     │
//! │  DELETE /api/history/{id}  → delete own entry│
//! │  GET    /api/stats         → learning stats  │
//! │  GET    /api/health        → health check    │
//! └──────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod error;
pub mod health;
pub mod history;
pub mod learn;

use axum::{
    extract::{ConnectInfo, FromRef, MatchedPath, Request, State},
    http::HeaderMap,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::ai::AiService;
use crate::auth::AuthState;
use crate::rate_limit::RateLimiter;
use crate::store::Store;

pub use error::{ApiError, JsonBody, PathParam};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub auth: Arc<AuthState>,
    pub ai: AiService,
    pub limits: Option<RateLimits>,
    /// Whether the AI provider has credentials
    pub ai_configured: bool,
    /// Server start time for uptime calculation
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<Store>, auth: Arc<AuthState>, ai: AiService) -> Self {
        Self {
            store,
            auth,
            ai,
            limits: None,
            ai_configured: false,
            started_at: Instant::now(),
        }
    }

    pub fn with_ai_configured(mut self, configured: bool) -> Self {
        self.ai_configured = configured;
        self
    }

    pub fn with_rate_limits(mut self, limits: RateLimits) -> Self {
        self.limits = Some(limits);
        self
    }
}

impl FromRef<AppState> for Arc<AuthState> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Request limiters applied to the API
///
/// Quotas are tracked per client and per route. The AI routes are covered
/// by `ai` only; every other route except `/health` by `api`.
#[derive(Clone)]
pub struct RateLimits {
    /// Non-AI routes
    pub api: Arc<RateLimiter>,
    /// AI generation routes
    pub ai: Arc<RateLimiter>,
    /// Take the client address from proxy headers
    pub trust_proxy: bool,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            api: Arc::new(RateLimiter::api_default()),
            ai: Arc::new(RateLimiter::ai_generation()),
            trust_proxy: false,
        }
    }
}

impl RateLimits {
    pub fn with_trust_proxy(mut self, trust_proxy: bool) -> Self {
        self.trust_proxy = trust_proxy;
        self
    }

    pub async fn cleanup(&self) {
        self.api.cleanup().await;
        self.ai.cleanup().await;
    }

    fn guard(&self, limiter: &Arc<RateLimiter>) -> LimitGuard {
        LimitGuard {
            limiter: limiter.clone(),
            trust_proxy: self.trust_proxy,
        }
    }
}

/// Middleware state for one limiter
#[derive(Clone)]
pub struct LimitGuard {
    limiter: Arc<RateLimiter>,
    trust_proxy: bool,
}

/// Create the API router (mounted under `/api` by the server)
pub fn api_router(state: AppState) -> Router {
    let mut generation = Router::new()
        .route("/explain", post(learn::explain))
        .route("/mcq", post(learn::mcq));

    let mut router = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/mcq/score", post(learn::save_score))
        .route("/history", get(history::list))
        .route("/history/{id}", delete(history::remove))
        .route("/stats", get(history::stats));

    if let Some(limits) = &state.limits {
        generation = generation.route_layer(middleware::from_fn_with_state(limits.guard(&limits.ai), rate_limit));
        router = router.route_layer(middleware::from_fn_with_state(limits.guard(&limits.api), rate_limit));
    }

    // Health stays outside the limiters
    router
        .merge(generation)
        .route("/health", get(health::health_check))
        .with_state(state)
}

/// Reject requests from clients that exceeded the limiter's quotas on this route
pub async fn rate_limit(State(guard): State<LimitGuard>, req: Request, next: Next) -> Response {
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
    let client = client_key(req.headers(), peer, guard.trust_proxy);
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let result = guard.limiter.check(&format!("{} {}", client, route)).await;
    if !result.allowed {
        return ApiError::RateLimited {
            message: "Too many requests. Please slow down.".to_string(),
            retry_after_secs: Some(result.retry_after_secs),
        }
        .into_response();
    }

    next.run(req).await
}

/// Client identity: the peer address, or with `trust_proxy` the first
/// X-Forwarded-For hop, then X-Real-IP
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
            if let Some(ip) = forwarded.split(',').next().map(str::trim).filter(|ip| !ip.is_empty()) {
                return ip.to_string();
            }
        }

        if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
            return real_ip.trim().to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn proxied_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        headers
    }

    #[test]
    fn test_client_key_ignores_proxy_headers_by_default() {
        let peer: SocketAddr = "192.0.2.9:4444".parse().unwrap();
        assert_eq!(client_key(&proxied_headers(), Some(peer), false), "192.0.2.9");
        assert_eq!(client_key(&proxied_headers(), None, false), "unknown");
    }

    #[test]
    fn test_client_key_trusted_proxy_prefers_forwarded_for() {
        assert_eq!(client_key(&proxied_headers(), None, true), "203.0.113.7");
    }

    #[test]
    fn test_client_key_trusted_proxy_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_key(&headers, None, true), "198.51.100.2");

        let peer: SocketAddr = "192.0.2.9:4444".parse().unwrap();
        assert_eq!(client_key(&HeaderMap::new(), Some(peer), true), "192.0.2.9");
    }
}
