//! Language-model interaction: the [`LanguageService`] seam, its
//! `edgequake-llm` implementation, and the retry/timeout policy applied to
//! every call.
//!
//! Prompt text lives in [`crate::prompts`] and reply parsing in
//! [`crate::report`], so this module only moves strings to and from the
//! provider.
//!
//! ## Retry Strategy
//!
//! Each attempt is bounded by `api_timeout_secs`. When `max_retries > 0`,
//! failed attempts are retried with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`): with a 500 ms base the waits are
//! 500 ms → 1 s → 2 s. The default is no retry.

use crate::chunker::split_paragraphs;
use crate::config::ServiceConfig;
use crate::error::{ChunkError, DocFixError, ServiceError};
use crate::prompts::{compliance_prompt, correction_prompt, EDITOR_SYSTEM_PROMPT};
use crate::report::{parse_report, ComplianceReport};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Default Gemini model when only `GEMINI_API_KEY` is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// The two questions the pipelines ask of a language model.
#[async_trait]
pub trait LanguageService: Send + Sync {
    /// Analyse `text` for grammar, style, clarity and professionalism.
    async fn analyze(&self, text: &str) -> Result<ComplianceReport, ServiceError>;

    /// Return a corrected version of `text`, keeping its paragraphs
    /// separated by blank lines.
    async fn correct(&self, text: &str) -> Result<String, ServiceError>;
}

/// [`LanguageService`] backed by an `edgequake-llm` provider.
pub struct LlmService {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    compliance_prompt: Option<String>,
    correction_prompt: Option<String>,
}

impl LlmService {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ServiceConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            compliance_prompt: config.compliance_prompt.clone(),
            correction_prompt: config.correction_prompt.clone(),
        }
    }

    /// Build a service from the provider resolved out of `config` and the
    /// environment. See [`resolve_provider`].
    pub fn from_config(config: &ServiceConfig) -> Result<Self, DocFixError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    async fn complete(&self, prompt: String) -> Result<String, ServiceError> {
        let messages = vec![
            ChatMessage::system(EDITOR_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let start = Instant::now();
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ServiceError::Api(e.to_string()))?;

        debug!(
            "{} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

#[async_trait]
impl LanguageService for LlmService {
    async fn analyze(&self, text: &str) -> Result<ComplianceReport, ServiceError> {
        let prompt = compliance_prompt(self.compliance_prompt.as_deref(), text);
        let reply = self.complete(prompt).await?;
        parse_report(&reply).map_err(ServiceError::MalformedResponse)
    }

    async fn correct(&self, text: &str) -> Result<String, ServiceError> {
        let paragraphs = split_paragraphs(text).len();
        let prompt = correction_prompt(self.correction_prompt.as_deref(), text, paragraphs);
        let reply = self.complete(prompt).await?;
        if reply.trim().is_empty() {
            return Err(ServiceError::MalformedResponse("empty reply".into()));
        }
        Ok(reply)
    }
}

/// Build `CompletionOptions` from the service config.
fn build_options(config: &ServiceConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Run one model call for chunk `chunk` under the configured timeout and
/// retry policy.
///
/// `call` is invoked once per attempt. The last attempt's failure decides
/// the returned [`ChunkError`] variant.
pub async fn call_with_retry<T, F, Fut>(
    chunk: usize,
    config: &ServiceConfig,
    call: F,
) -> Result<T, ChunkError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let limit = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<ServiceError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Chunk {}: retry {}/{} after {}ms",
                chunk, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(limit, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                warn!("Chunk {}: attempt {} failed: {}", chunk, attempt + 1, e);
                last_err = Some(e);
            }
            Err(_) => {
                warn!(
                    "Chunk {}: attempt {} timed out after {}s",
                    chunk,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = None;
            }
        }
    }

    Err(match last_err {
        None => ChunkError::Timeout {
            chunk,
            secs: config.api_timeout_secs,
        },
        Some(ServiceError::MalformedResponse(detail)) => {
            ChunkError::MalformedResponse { chunk, detail }
        }
        Some(ServiceError::Api(detail)) => ChunkError::ServiceFailed {
            chunk,
            retries: config.max_retries,
            detail,
        },
    })
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DocFixError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocFixError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Model used for a named provider when none is configured.
pub fn default_model(provider_name: &str) -> Option<&'static str> {
    match provider_name.to_ascii_lowercase().as_str() {
        "gemini" | "google" => Some(DEFAULT_GEMINI_MODEL),
        "openai" | "azure" => Some("gpt-4.1-mini"),
        "anthropic" => Some("claude-sonnet-4-20250514"),
        "ollama" => Some("llama3.2"),
        _ => None,
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model`, or
///    that provider's [`default_model`] when no model is set.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **Gemini** when `GEMINI_API_KEY` is present.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
///
/// API keys are always read from the provider's environment variable.
pub fn resolve_provider(config: &ServiceConfig) -> Result<Arc<dyn LLMProvider>, DocFixError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = match config.model.as_deref() {
            Some(model) => model,
            None => default_model(name).ok_or_else(|| DocFixError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("No default model for provider '{name}'; set a model explicitly."),
            })?,
        };
        return create_provider(name, model);
    }

    if let (Some(prov), Some(model)) = (
        non_empty_env("EDGEQUAKE_LLM_PROVIDER"),
        non_empty_env("EDGEQUAKE_MODEL"),
    ) {
        return create_provider(&prov, &model);
    }

    if non_empty_env("GEMINI_API_KEY").is_some() {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocFixError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(max_retries: u32, timeout_secs: u64) -> ServiceConfig {
        ServiceConfig::builder()
            .max_retries(max_retries)
            .retry_backoff_ms(1)
            .api_timeout_secs(timeout_secs)
            .build()
            .unwrap()
    }

    #[test]
    fn default_model_matches_provider() {
        assert_eq!(default_model("gemini"), Some(DEFAULT_GEMINI_MODEL));
        assert_eq!(default_model("OpenAI"), Some("gpt-4.1-mini"));
        assert_eq!(default_model("anthropic"), Some("claude-sonnet-4-20250514"));
        assert_eq!(default_model("ollama"), Some("llama3.2"));
        assert_eq!(default_model("mystery"), None);
    }

    #[test]
    fn unknown_provider_without_model_is_not_configured() {
        let config = ServiceConfig::builder()
            .provider_name("mystery")
            .build()
            .unwrap();
        match resolve_provider(&config) {
            Err(DocFixError::ProviderNotConfigured { provider, hint }) => {
                assert_eq!(provider, "mystery");
                assert!(hint.contains("set a model"), "{hint}");
            }
            Err(other) => panic!("expected ProviderNotConfigured, got {other:?}"),
            Ok(_) => panic!("expected ProviderNotConfigured, got a provider"),
        }
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&ServiceConfig::default());
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let out = call_with_retry(0, &config(0, 5), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ServiceError>("fine")
        })
        .await
        .unwrap();
        assert_eq!(out, "fine");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let calls = AtomicU32::new(0);
        let err = call_with_retry(3, &config(0, 5), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ServiceError::Api("503 overloaded".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            err,
            ChunkError::ServiceFailed { chunk: 3, retries: 0, .. }
        ));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let out = call_with_retry(1, &config(2, 5), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ServiceError::Api("flaky".into()))
            } else {
                Ok(42)
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn malformed_reply_keeps_its_kind() {
        let err = call_with_retry(2, &config(0, 5), || async {
            Err::<(), _>(ServiceError::MalformedResponse("no JSON object".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ChunkError::MalformedResponse { chunk: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let err = call_with_retry(5, &config(0, 1), || async {
            sleep(Duration::from_secs(10)).await;
            Ok::<_, ServiceError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ChunkError::Timeout { chunk: 5, secs: 1 }));
    }
}
