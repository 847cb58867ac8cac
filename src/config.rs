//! Configuration management
//!
//! Everything is read from the environment (after `.env` is loaded by
//! `main`). Insecure defaults are allowed so the server starts in
//! development, but each one logs a warning.

use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tracing::warn;

/// Placeholder JWT secret used when `JWT_SECRET_KEY` is unset
pub const DEFAULT_JWT_SECRET: &str = "change-this-jwt-secret";

/// Default Gemini model
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Default Gemini API endpoint
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Dev-server origins that are always allowed by CORS
const DEV_ORIGINS: [&str; 2] = ["http://127.0.0.1:5173", "http://localhost:5173"];

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address (default: 127.0.0.1)
    pub bind_addr: IpAddr,

    /// Port number (default: 5000)
    pub port: u16,

    /// SQLite database path
    pub db_path: PathBuf,

    /// HS256 signing secret for access tokens
    pub jwt_secret: String,

    /// Gemini API key (AI endpoints fail without it)
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    pub gemini_model: String,

    /// Gemini API base URL
    pub gemini_base_url: String,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,

    /// Built frontend to serve for non-API paths
    pub static_dir: Option<PathBuf>,

    /// Enable per-client request rate limiting
    pub rate_limit_enabled: bool,

    /// Identify clients by X-Forwarded-For / X-Real-IP (only behind a proxy)
    pub trust_proxy: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 5000,
            db_path: PathBuf::from("learning_platform.db"),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            cors_origins: DEV_ORIGINS.iter().map(|o| o.to_string()).collect(),
            static_dir: None,
            rate_limit_enabled: true,
            trust_proxy: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .with_context(|| format!("Invalid BIND_ADDR: {}", addr))?;
        }

        if let Ok(port) = std::env::var("PORT") {
            config.port = port
                .parse()
                .with_context(|| format!("Invalid PORT: {}", port))?;
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Ok(secret) = std::env::var("JWT_SECRET_KEY") {
            config.jwt_secret = secret;
        }

        config.gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.gemini_model = model;
        }

        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            config.gemini_base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(origin) = std::env::var("PRODUCTION_ORIGIN") {
            if !origin.is_empty() {
                config.cors_origins.push(origin);
            }
        }

        config.static_dir = std::env::var("STATIC_DIR").ok().map(PathBuf::from);

        config.rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        config.trust_proxy = std::env::var("TRUST_PROXY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        config.warn_insecure_defaults();
        Ok(config)
    }

    /// Log a warning for each setting that is unsafe outside development
    pub fn warn_insecure_defaults(&self) {
        if self.gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY is not set - AI features will not work");
        }

        if self.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("JWT_SECRET_KEY is using the default value - change it for production");
        }

        if !self.is_localhost() {
            warn!("Binding to {} - make sure a reverse proxy terminates TLS", self.bind_addr);
        }
    }

    /// Check if bound to localhost only
    pub fn is_localhost(&self) -> bool {
        self.bind_addr.is_loopback()
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.bind_addr, self.port)
    }
}
