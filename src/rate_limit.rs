//! Request Rate Limiting
//!
//! Sliding-window limits keyed by client identity. A limiter carries one or
//! more quotas (e.g. 50/hour and 200/day); a request is admitted only when
//! every quota has room, and only admitted requests are counted.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A cap of `max_requests` within a sliding `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub max_requests: u32,
    pub window: Duration,
}

impl Quota {
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }

    pub const fn per_hour(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60 * 60),
        }
    }

    pub const fn per_day(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Seconds until the tightest exhausted window frees a slot
    pub retry_after_secs: u64,
}

impl RateLimitResult {
    fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after_secs: 0,
        }
    }

    fn denied(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            retry_after_secs,
        }
    }
}

/// Per-client sliding-window limiter
pub struct RateLimiter {
    name: String,
    quotas: Vec<Quota>,
    /// Admitted request times per client, oldest first
    clients: RwLock<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(name: &str, quotas: Vec<Quota>) -> Self {
        Self {
            name: name.to_string(),
            quotas,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Default limits for every API route: 200 per day, 50 per hour
    pub fn api_default() -> Self {
        Self::new("api", vec![Quota::per_day(200), Quota::per_hour(50)])
    }

    /// Limits for AI generation routes: 10 per minute
    pub fn ai_generation() -> Self {
        Self::new("ai", vec![Quota::per_minute(10)])
    }

    fn longest_window(&self) -> Duration {
        self.quotas.iter().map(|q| q.window).max().unwrap_or_default()
    }

    /// Check and, if allowed, record a request from `client`
    pub async fn check(&self, client: &str) -> RateLimitResult {
        let now = Instant::now();
        let longest = self.longest_window();

        let mut clients = self.clients.write().await;
        let requests = clients.entry(client.to_string()).or_default();
        requests.retain(|&t| now.duration_since(t) < longest);

        let mut retry_after = Duration::ZERO;
        for quota in &self.quotas {
            let in_window: Vec<&Instant> = requests
                .iter()
                .filter(|&&t| now.duration_since(t) < quota.window)
                .collect();

            if in_window.len() >= quota.max_requests as usize {
                // The oldest request inside the window is the next to expire
                let frees_at = in_window
                    .first()
                    .map(|&&t| quota.window.saturating_sub(now.duration_since(t)))
                    .unwrap_or(quota.window);
                retry_after = retry_after.max(frees_at);
            }
        }

        if retry_after > Duration::ZERO {
            warn!(
                "Client {} rate limited on {} ({} recent requests)",
                client,
                self.name,
                requests.len()
            );
            return RateLimitResult::denied(retry_after.as_secs().max(1));
        }

        requests.push(now);
        debug!("Client {} allowed on {}", client, self.name);
        RateLimitResult::allowed()
    }

    /// Drop clients with no requests inside the longest window
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let longest = self.longest_window();

        let mut clients = self.clients.write().await;
        clients.retain(|_, requests| {
            requests.retain(|&t| now.duration_since(t) < longest);
            !requests.is_empty()
        });
    }

    /// Number of clients currently tracked
    pub async fn tracked_clients(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_allows_under_limit() {
        let limiter = RateLimiter::new("test", vec![Quota::per_minute(5)]);

        for i in 0..5 {
            let result = limiter.check("10.0.0.1").await;
            assert!(result.allowed, "Request {} should be allowed", i);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_over_limit() {
        let limiter = RateLimiter::new("test", vec![Quota::per_minute(3)]);

        for _ in 0..3 {
            assert!(limiter.check("10.0.0.1").await.allowed);
        }

        let result = limiter.check("10.0.0.1").await;
        assert!(!result.allowed);
        assert!(result.retry_after_secs > 0 && result.retry_after_secs <= 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_isolation() {
        let limiter = RateLimiter::new("test", vec![Quota::per_minute(2)]);

        limiter.check("a").await;
        limiter.check("a").await;
        assert!(!limiter.check("a").await.allowed);

        assert!(limiter.check("b").await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = RateLimiter::new("test", vec![Quota::per_minute(2)]);

        limiter.check("a").await;
        limiter.check("a").await;
        assert!(!limiter.check("a").await.allowed);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("a").await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_quota_applies() {
        let limiter = RateLimiter::new("test", vec![Quota::per_minute(10), Quota::per_hour(3)]);

        for _ in 0..3 {
            assert!(limiter.check("a").await.allowed);
        }
        // Minute quota has room but the hourly one does not
        assert!(!limiter.check("a").await.allowed);

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(!limiter.check("a").await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_requests_not_counted() {
        let limiter = RateLimiter::new("test", vec![Quota::per_minute(1)]);

        assert!(limiter.check("a").await.allowed);
        for _ in 0..5 {
            assert!(!limiter.check("a").await.allowed);
        }

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.check("a").await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_drops_idle_clients() {
        let limiter = RateLimiter::new("test", vec![Quota::per_minute(5)]);

        limiter.check("a").await;
        limiter.check("b").await;
        assert_eq!(limiter.tracked_clients().await, 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        limiter.check("b").await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[test]
    fn test_default_quotas() {
        let limiter = RateLimiter::api_default();
        assert_eq!(limiter.quotas, vec![Quota::per_day(200), Quota::per_hour(50)]);
        assert_eq!(limiter.longest_window(), Duration::from_secs(86_400));
    }
}
