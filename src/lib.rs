//! StudyBot API
//!
//! Backend for an AI learning platform: accounts, AI explanations and
//! quizzes, per-user history, and learning statistics.
//!
//! # Architecture
//!
//! ```text
//! Browser ──► Server (axum) ──► api handlers ──► Store (SQLite)
//!               │                    │
//!               ├── CORS / headers   └── AiService ──► Gemini
//!               ├── Rate limiter          (timeout + retry)
//!               └── Static frontend
//! ```

pub mod ai;
pub mod api;
pub mod auth;
pub mod config;
pub mod gemini;
pub mod prompts;
pub mod rate_limit;
pub mod sanitize;
pub mod server;
pub mod stats;
pub mod store;

pub use ai::{AiError, AiService, ProviderError, RetryPolicy, TextGenerator};
pub use api::{api_router, ApiError, AppState, RateLimits};
pub use auth::{AuthError, AuthState, AuthUser};
pub use config::Config;
pub use gemini::GeminiClient;
pub use prompts::{ExplainLength, ExplainRequest, Language};
pub use rate_limit::{Quota, RateLimiter};
pub use server::Server;
pub use stats::UserStats;
pub use store::{HistoryEntry, HistoryKind, Store, StoreError, User};
