//! StudyBot API - Entry Point

use std::sync::Arc;

use studybot_api::{AiService, AppState, AuthState, Config, GeminiClient, RateLimits, Server, Store};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("StudyBot API v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: studybot-api [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --help, -h           Show this help");
        println!();
        println!("Environment variables:");
        println!("  BIND_ADDR            Bind address (default: 127.0.0.1)");
        println!("  PORT                 Port (default: 5000)");
        println!("  DATABASE_PATH        SQLite file (default: learning_platform.db)");
        println!("  JWT_SECRET_KEY       Token signing secret");
        println!("  GEMINI_API_KEY       Gemini API key");
        println!("  GEMINI_MODEL         Gemini model (default: gemini-2.5-flash)");
        println!("  GEMINI_BASE_URL      Gemini API base URL");
        println!("  PRODUCTION_ORIGIN    Extra allowed CORS origin");
        println!("  STATIC_DIR           Built frontend to serve");
        println!("  RATE_LIMIT_ENABLED   Per-client rate limiting (default: true)");
        println!("  TRUST_PROXY          Use X-Forwarded-For for client identity (default: false)");
        println!("  RUST_LOG             Log filter (default: info)");
        println!("  LOG_FORMAT           Set to 'json' for JSON logs");
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("StudyBot API v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let store = Store::open(&config.db_path)?;
    info!("Database: {}", config.db_path.display());

    let auth = AuthState::new(&config.jwt_secret);

    let gemini = GeminiClient::from_config(&config);
    let ai_configured = gemini.is_available();
    info!("AI model: {} (configured: {})", gemini.model(), ai_configured);

    let mut state = AppState::new(Arc::new(store), Arc::new(auth), AiService::new(Arc::new(gemini)))
        .with_ai_configured(ai_configured);

    if config.rate_limit_enabled {
        state = state.with_rate_limits(RateLimits::default().with_trust_proxy(config.trust_proxy));
    }

    Server::new(config, state).run().await
}
