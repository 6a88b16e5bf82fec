//! Model invocation: send the analysis prompt and return the raw answer.
//!
//! The pipeline only sees the [`ModelInvoker`] trait, so the orchestrator can
//! be driven by a fake in tests and by [`LlmInvoker`] in production. All
//! prompt engineering lives in [`crate::prompts`]; this module handles the
//! call itself, its timeout and the optional retry policy.
//!
//! ## Retry Policy
//!
//! `max_retries` defaults to 0: one outbound call per request and any
//! failure goes straight back to the caller. When raised, API errors, rate
//! limits and timeouts are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`, at most [`MAX_BACKOFF_MS`] per wait).
//! Empty answers are never retried.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::prompts::AnalysisPrompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Upper bound on a single retry delay.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Untyped model output, trimmed, plus token usage when reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelResponse {
    pub text: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl RawModelResponse {
    /// Wrap provider text, trimming it. Token counts default to zero.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Something that turns an analysis prompt into model text.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    /// Make the call. Implementations must return trimmed, non-empty text or
    /// an invocation-class [`AnalysisError`].
    async fn invoke(&self, prompt: &AnalysisPrompt) -> Result<RawModelResponse, AnalysisError>;
}

/// [`ModelInvoker`] backed by an `edgequake_llm` provider.
pub struct LlmInvoker {
    provider: Arc<dyn LLMProvider>,
    model: String,
    options: CompletionOptions,
    timeout_secs: u64,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl LlmInvoker {
    /// Wrap an existing provider.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            options: build_options(config),
            timeout_secs: config.api_timeout_secs,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// Use `config.provider` if set, otherwise create the named provider.
    ///
    /// The factory reads the provider's credential from the environment
    /// (`GEMINI_API_KEY` for gemini).
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let provider = match config.provider {
            Some(ref provider) => Arc::clone(provider),
            None => ProviderFactory::create_llm_provider(&config.provider_name, &config.model)
                .map_err(|e| AnalysisError::ProviderNotConfigured {
                    provider: config.provider_name.clone(),
                    hint: format!(
                        "Set the provider's API key (GEMINI_API_KEY for gemini).\nError: {e}"
                    ),
                })?,
        };
        Ok(Self::new(provider, config))
    }

    async fn call_once(&self, messages: &[ChatMessage]) -> Result<RawModelResponse, AnalysisError> {
        let call = self.provider.chat(messages, Some(&self.options));
        let response = match timeout(Duration::from_secs(self.timeout_secs), call).await {
            Err(_) => {
                return Err(AnalysisError::ApiTimeout {
                    secs: self.timeout_secs,
                })
            }
            Ok(Err(e)) => return Err(classify_provider_error(&self.model, &e.to_string())),
            Ok(Ok(response)) => response,
        };

        let text = response.content.trim();
        if text.is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }

        Ok(RawModelResponse {
            text: text.to_string(),
            prompt_tokens: response.prompt_tokens as usize,
            completion_tokens: response.completion_tokens as usize,
        })
    }
}

#[async_trait]
impl ModelInvoker for LlmInvoker {
    fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, prompt: &AnalysisPrompt) -> Result<RawModelResponse, AnalysisError> {
        let messages = vec![ChatMessage::user(prompt.as_str())];

        let mut attempt = 0;
        loop {
            match self.call_once(&messages).await {
                Ok(response) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens",
                        self.model, response.prompt_tokens, response.completion_tokens
                    );
                    return Ok(response);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = backoff_delay_ms(self.retry_backoff_ms, attempt);
                    warn!(
                        "{}: attempt {} failed: {}; retry {}/{} after {}ms",
                        self.model, attempt, e, attempt, self.max_retries, backoff
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Wait before retry number `attempt` (1-based), doubling from `base_ms`.
fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .map_or(u64::MAX, |factor| base_ms.saturating_mul(factor))
        .min(MAX_BACKOFF_MS)
}

/// Build `CompletionOptions` from the analysis config.
fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Map a provider error message onto the invocation taxonomy.
fn classify_provider_error(model: &str, message: &str) -> AnalysisError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("ratelimit")
        || lower.contains("resource_exhausted")
        || lower.contains("quota")
    {
        AnalysisError::RateLimitExceeded {
            model: model.to_string(),
            message: message.to_string(),
        }
    } else {
        AnalysisError::LlmApiError {
            message: message.to_string(),
        }
    }
}
