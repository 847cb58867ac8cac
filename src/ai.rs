//! AI Call Wrapper
//!
//! Sends a prompt to a [`TextGenerator`] with a per-attempt timeout and a
//! single fixed-delay retry, then maps provider failures onto the two
//! error kinds the API exposes.
//!
//! ```text
//! Attempting ──ok──────────────────────────► Succeeded
//!     │
//!     ├─InvalidArgument──────────────────────► Failed(InvalidRequest)
//!     │
//!     └─other──► sleep(backoff) ──► Attempting ──ok──► Succeeded
//!                                       │
//!                                       └─err──► Failed(RateLimited | Service)
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::prompts::{explain_prompt, mcq_prompt, ExplainRequest};

/// Per-attempt timeout
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay before the retry
pub const RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Raw provider failure, classified by the generator implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider rejected the prompt itself
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Provider quota or rate limit hit
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Provider gave up on the request
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Local timeout fired before the provider answered
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// Application-level AI failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AiError {
    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("AI service error: {0}")]
    Service(String),
}

impl AiError {
    /// Map a final-attempt provider failure
    fn from_final(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidArgument(_) => Self::invalid_request(),
            ProviderError::ResourceExhausted(_) => {
                Self::RateLimited("AI service is busy. Please wait a moment and try again.".into())
            }
            ProviderError::DeadlineExceeded(_) | ProviderError::Timeout(_) => {
                Self::RateLimited("AI service took too long. Please try again.".into())
            }
            ProviderError::Other(msg) => Self::Service(msg),
        }
    }

    fn invalid_request() -> Self {
        Self::InvalidRequest("Invalid request. Please modify your topic.".into())
    }
}

/// A text-generation backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Timeout and retry settings
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub backoff: Duration,
    pub retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: CALL_TIMEOUT,
            backoff: RETRY_BACKOFF,
            retries: 1,
        }
    }
}

/// Prompt-level AI operations over a shared generator
#[derive(Clone)]
pub struct AiService {
    generator: Arc<dyn TextGenerator>,
    policy: RetryPolicy,
}

impl AiService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_policy(generator, RetryPolicy::default())
    }

    pub fn with_policy(generator: Arc<dyn TextGenerator>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    /// Generate an explanation for a topic
    pub async fn explain_topic(&self, req: &ExplainRequest) -> Result<String, AiError> {
        self.call(&explain_prompt(req)).await
    }

    /// Generate `count` multiple-choice questions for a topic
    pub async fn generate_mcq(&self, topic: &str, count: u32) -> Result<String, AiError> {
        self.call(&mcq_prompt(topic, count)).await
    }

    /// Call the generator with timeout and retry
    pub async fn call(&self, prompt: &str) -> Result<String, AiError> {
        let mut attempt = 0;

        loop {
            debug!("AI call attempt {} (prompt_len={})", attempt + 1, prompt.len());

            let err = match self.attempt(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            // Retrying a rejected prompt cannot help
            if matches!(err, ProviderError::InvalidArgument(_)) {
                return Err(AiError::invalid_request());
            }

            if attempt >= self.policy.retries {
                return Err(AiError::from_final(err));
            }

            warn!(
                "AI call failed (attempt {}), retrying in {:?}: {}",
                attempt + 1,
                self.policy.backoff,
                err
            );
            tokio::time::sleep(self.policy.backoff).await;
            attempt += 1;
        }
    }

    async fn attempt(&self, prompt: &str) -> Result<String, ProviderError> {
        match tokio::time::timeout(self.policy.timeout, self.generator.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.policy.timeout)),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Generator that replays a fixed script of outcomes
    pub struct ScriptedGenerator {
        script: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl ScriptedGenerator {
        pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        /// Every call answers with `text`
        pub fn always(text: &str) -> Self {
            Self::new(vec![Ok(text.to_string()); 8])
        }

        /// Sleep this long before answering
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn last_prompt(&self) -> Option<String> {
            self.prompts.lock().last().cloned()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().push(prompt.to_string());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Other("script exhausted".into())))
        }
    }
}
