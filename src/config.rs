//! Configuration types for the document compliance service.
//!
//! All pipeline behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. One config is shared by every job the
//! service runs.

use crate::chunker::DEFAULT_MAX_CHUNK_CHARS;
use crate::error::DocFixError;
use crate::progress::ProgressCallback;
use crate::prompts::CHUNK_PLACEHOLDER;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the compliance and correction pipelines.
///
/// Built via [`ServiceConfig::builder()`] or using
/// [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docfix::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .max_chunk_chars(1500)
///     .concurrency(8)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Upper bound on chunk length in characters. Default: 2000.
    ///
    /// A single paragraph longer than this still becomes one chunk.
    pub max_chunk_chars: usize,

    /// Number of concurrent model calls per pipeline. Default: 4.
    ///
    /// Results are committed in chunk order regardless of this value.
    pub concurrency: usize,

    /// LLM model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-mini".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate per chunk. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts after a failed model call. Default: 0.
    ///
    /// With the default, the first failure of any chunk fails the job.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds; doubles after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Directory that receives `corrected_<file_id>.docx`. Default: `output`.
    pub output_dir: PathBuf,

    /// Custom compliance prompt; must contain `{chunk}`.
    pub compliance_prompt: Option<String>,

    /// Custom correction prompt; must contain `{chunk}`.
    pub correction_prompt: Option<String>,

    /// Optional per-chunk progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            output_dir: PathBuf::from("output"),
            compliance_prompt: None,
            correction_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("max_chunk_chars", &self.max_chunk_chars)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("output_dir", &self.output_dir)
            .field("compliance_prompt", &self.compliance_prompt.is_some())
            .field("correction_prompt", &self.correction_prompt.is_some())
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn max_chunk_chars(mut self, n: usize) -> Self {
        self.config.max_chunk_chars = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn compliance_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.compliance_prompt = Some(prompt.into());
        self
    }

    pub fn correction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.correction_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, DocFixError> {
        let c = &self.config;
        if c.max_chunk_chars == 0 {
            return Err(DocFixError::InvalidConfig(
                "max_chunk_chars must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(DocFixError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocFixError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        for (name, prompt) in [
            ("compliance_prompt", &c.compliance_prompt),
            ("correction_prompt", &c.correction_prompt),
        ] {
            if let Some(p) = prompt {
                if !p.contains(CHUNK_PLACEHOLDER) {
                    return Err(DocFixError::InvalidConfig(format!(
                        "{name} must contain the {CHUNK_PLACEHOLDER} placeholder"
                    )));
                }
            }
        }
        Ok(self.config)
    }
}
