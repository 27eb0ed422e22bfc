//! Inference capability: send an instruction (and optionally one page image)
//! to a hosted model and get text back.
//!
//! The orchestrator only sees the [`InferenceClient`] trait. The production
//! implementation, [`LlmInferenceClient`], sits on top of `edgequake-llm` and
//! resolves a provider per model id; tests swap in a scripted stub.
//!
//! One request is one attempt. Nothing here retries: a failed page becomes a
//! placeholder in the report and a failed summary is surfaced to the caller.

use crate::config::AnalysisConfig;
use crate::error::InferenceError;
use crate::output::RenderedImage;
use crate::pipeline::encode::to_image_data;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// One generation request.
#[derive(Debug, Clone, Copy)]
pub struct InferenceRequest<'a> {
    /// Provider model id, e.g. `gemini-1.5-flash`.
    pub model_id: &'a str,
    /// Text instruction sent alongside the image.
    pub instruction: &'a str,
    /// Page image for multimodal calls; `None` for text-only calls.
    pub image: Option<&'a RenderedImage>,
}

impl<'a> InferenceRequest<'a> {
    /// Instruction plus one page image.
    pub fn multimodal(model_id: &'a str, instruction: &'a str, image: &'a RenderedImage) -> Self {
        Self {
            model_id,
            instruction,
            image: Some(image),
        }
    }

    /// Text-only request.
    pub fn text(model_id: &'a str, instruction: &'a str) -> Self {
        Self {
            model_id,
            instruction,
            image: None,
        }
    }
}

/// Model output and token accounting for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceResponse {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// The remote-model capability the analyzer depends on.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Check that `model_id` can be served before any page is sent.
    ///
    /// A failure here is fatal for the run, unlike a failed [`generate`]
    /// call, which only costs one page.
    ///
    /// [`generate`]: InferenceClient::generate
    fn prepare(&self, model_id: &str) -> Result<(), InferenceError> {
        let _ = model_id;
        Ok(())
    }

    async fn generate(
        &self,
        request: InferenceRequest<'_>,
    ) -> Result<InferenceResponse, InferenceError>;
}

/// [`InferenceClient`] backed by `edgequake-llm` providers.
///
/// Providers are built lazily on first use of a model id and then cached,
/// so a run with one model builds its provider once.
pub struct LlmInferenceClient {
    provider: Option<Arc<dyn LLMProvider>>,
    provider_name: Option<String>,
    cache: Mutex<HashMap<String, Arc<dyn LLMProvider>>>,
    temperature: f32,
    max_tokens: usize,
}

impl Default for LlmInferenceClient {
    fn default() -> Self {
        Self {
            provider: None,
            provider_name: None,
            cache: Mutex::new(HashMap::new()),
            temperature: 0.2,
            max_tokens: 4096,
        }
    }
}

impl std::fmt::Debug for LlmInferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmInferenceClient")
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmInferenceClient {
    /// Client that auto-detects its provider from the environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Client that sends every request to an already-built provider,
    /// regardless of the requested model id.
    pub fn with_provider(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider: Some(provider),
            ..Self::default()
        }
    }

    /// Client using the provider name and sampling settings of `config`.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let mut client = Self::new()
            .temperature(config.temperature)
            .max_tokens(config.max_tokens);
        client.provider_name = config.provider_name.clone();
        client
    }

    /// Force a named provider (`gemini`, `openai`, `anthropic`, `ollama`, ...).
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }

    /// Resolve the provider for `model_id`, from most to least specific:
    ///
    /// 1. the pre-built provider, if any;
    /// 2. the named provider;
    /// 3. `EDGEQUAKE_LLM_PROVIDER`;
    /// 4. Gemini, when the model is a Gemini model and `GEMINI_API_KEY` is set;
    /// 5. the provider [`ProviderFactory::from_env`] detects, rebuilt for
    ///    `model_id`.
    ///
    /// Whatever the branch, the provider must serve exactly `model_id`.
    fn resolve(&self, model_id: &str) -> Result<Arc<dyn LLMProvider>, InferenceError> {
        if let Some(ref provider) = self.provider {
            return Ok(Arc::clone(provider));
        }

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(provider) = cache.get(model_id) {
            return Ok(Arc::clone(provider));
        }

        let provider = self.build_provider(model_id)?;
        info!("Provider ready for model '{}'", model_id);
        cache.insert(model_id.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    fn build_provider(&self, model_id: &str) -> Result<Arc<dyn LLMProvider>, InferenceError> {
        if let Some(ref name) = self.provider_name {
            return create_provider(name, model_id);
        }

        if let Some(name) = non_empty_env("EDGEQUAKE_LLM_PROVIDER") {
            return create_provider(&name, model_id);
        }

        if model_id.starts_with("gemini") && non_empty_env("GEMINI_API_KEY").is_some() {
            return create_provider("gemini", model_id);
        }

        // from_env only tells us which provider is configured; its model is
        // the provider default, so build again for the requested one.
        let (detected, _embedding) =
            ProviderFactory::from_env().map_err(|e| InferenceError::NotConfigured {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                    Set GEMINI_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY) or name a provider.\n\
                    Error: {}",
                    e
                ),
            })?;
        debug!("Auto-detected provider '{}'", detected.name());
        let name = match detected.name() {
            "vertex-ai" => "vertexai",
            other => other,
        };
        create_provider(name, model_id)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, InferenceError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        InferenceError::NotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;

    // The mock provider, for one, ignores the requested model.
    let expected = model.strip_prefix("vertexai:").unwrap_or(model);
    if provider.model() != expected {
        return Err(InferenceError::NotConfigured {
            provider: provider.name().to_string(),
            hint: format!(
                "Provider '{}' cannot serve model '{}' (it would use '{}').\n\
                Set the API key for the model's provider or pass --provider.",
                provider.name(),
                model,
                provider.model()
            ),
        });
    }
    Ok(provider)
}

#[async_trait]
impl InferenceClient for LlmInferenceClient {
    fn prepare(&self, model_id: &str) -> Result<(), InferenceError> {
        self.resolve(model_id).map(|_| ())
    }

    async fn generate(
        &self,
        request: InferenceRequest<'_>,
    ) -> Result<InferenceResponse, InferenceError> {
        let provider = self.resolve(request.model_id)?;

        let message = match request.image {
            Some(image) => {
                ChatMessage::user_with_images(request.instruction, vec![to_image_data(image)])
            }
            None => ChatMessage::user(request.instruction),
        };

        let response = provider
            .chat(&[message], Some(&self.options()))
            .await
            .map_err(|e| InferenceError::Provider {
                message: format!("{}", e),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            request.model_id, response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(InferenceError::EmptyResponse);
        }

        Ok(InferenceResponse {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let config = AnalysisConfig::builder()
            .temperature(0.7)
            .max_tokens(1024)
            .provider_name("gemini")
            .build()
            .unwrap();
        let client = LlmInferenceClient::from_config(&config);
        let opts = client.options();
        assert_eq!(opts.temperature, Some(0.7));
        assert_eq!(opts.max_tokens, Some(1024));
        assert_eq!(client.provider_name.as_deref(), Some("gemini"));
    }

    #[test]
    fn default_options() {
        let opts = LlmInferenceClient::new().options();
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn request_constructors() {
        let img = RenderedImage {
            page_num: 1,
            width: 1,
            height: 1,
            png: vec![],
        };
        let r = InferenceRequest::multimodal("gemini-1.5-flash", "Describe.", &img);
        assert!(r.image.is_some());
        let r = InferenceRequest::text("gemini-1.5-flash", "Summarise.");
        assert!(r.image.is_none());
        assert_eq!(r.instruction, "Summarise.");
    }

    // ── Provider resolution ──────────────────────────────────────────────

    /// Every variable provider resolution or auto-detection looks at.
    const PROVIDER_ENV: &[&str] = &[
        "EDGEQUAKE_LLM_PROVIDER",
        "OLLAMA_HOST",
        "OLLAMA_MODEL",
        "LMSTUDIO_HOST",
        "LMSTUDIO_MODEL",
        "ANTHROPIC_API_KEY",
        "GEMINI_API_KEY",
        "GOOGLE_API_KEY",
        "GOOGLE_CLOUD_PROJECT",
        "MISTRAL_API_KEY",
        "AZURE_OPENAI_CONTENTGEN_API_KEY",
        "AZURE_OPENAI_API_KEY",
        "XAI_API_KEY",
        "HF_TOKEN",
        "HUGGINGFACE_TOKEN",
        "OPENROUTER_API_KEY",
        "OPENAI_API_KEY",
    ];

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Clears the provider environment, applies `vars`, and restores the
    /// previous values on drop. Holds a lock so env tests never interleave.
    struct ProviderEnv {
        saved: Vec<(&'static str, Option<String>)>,
        _lock: std::sync::MutexGuard<'static, ()>,
    }

    impl ProviderEnv {
        fn with(vars: &[(&str, &str)]) -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let saved = PROVIDER_ENV
                .iter()
                .map(|&k| (k, std::env::var(k).ok()))
                .collect();
            for k in PROVIDER_ENV {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
            Self { saved, _lock: lock }
        }
    }

    impl Drop for ProviderEnv {
        fn drop(&mut self) {
            for (k, v) in &self.saved {
                match v {
                    Some(v) => std::env::set_var(k, v),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn named_provider_serves_requested_model() {
        let _env = ProviderEnv::with(&[("OPENAI_API_KEY", "sk-test")]);
        let client = LlmInferenceClient::new().provider_name("openai");
        let provider = client.resolve("gpt-4.1-mini").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4.1-mini");
    }

    #[test]
    fn named_provider_without_key_is_not_configured() {
        let _env = ProviderEnv::with(&[]);
        let client = LlmInferenceClient::new().provider_name("openai");
        let err = client.prepare("gpt-4.1-mini").unwrap_err();
        match err {
            InferenceError::NotConfigured { ref provider, .. } => assert_eq!(provider, "openai"),
            other => panic!("expected NotConfigured, got {other:?}"),
        }
    }

    #[test]
    fn provider_env_var_serves_requested_model() {
        let _env = ProviderEnv::with(&[
            ("EDGEQUAKE_LLM_PROVIDER", "anthropic"),
            ("ANTHROPIC_API_KEY", "sk-ant-test"),
            ("OPENAI_API_KEY", "sk-test"),
        ]);
        let provider = LlmInferenceClient::new()
            .resolve("claude-sonnet-4-20250514")
            .unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.model(), "claude-sonnet-4-20250514");
    }

    #[test]
    fn gemini_key_selects_gemini_for_gemini_models() {
        let _env = ProviderEnv::with(&[
            ("GEMINI_API_KEY", "gm-test"),
            ("OPENAI_API_KEY", "sk-test"),
        ]);
        let provider = LlmInferenceClient::new().resolve("gemini-1.5-pro").unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.model(), "gemini-1.5-pro");
    }

    #[test]
    fn auto_detected_provider_keeps_requested_model() {
        let _env = ProviderEnv::with(&[("OPENAI_API_KEY", "sk-test")]);
        let provider = LlmInferenceClient::new().resolve("gpt-4.1-mini").unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4.1-mini");
    }

    #[test]
    fn no_provider_in_environment_is_not_configured() {
        let _env = ProviderEnv::with(&[]);
        let err = LlmInferenceClient::new()
            .prepare("gemini-1.5-flash")
            .unwrap_err();
        assert!(matches!(err, InferenceError::NotConfigured { .. }), "got {err:?}");
    }

    #[test]
    fn providers_are_cached_per_model() {
        let _env = ProviderEnv::with(&[("OPENAI_API_KEY", "sk-test")]);
        let client = LlmInferenceClient::new().provider_name("openai");
        let a = client.resolve("gpt-4.1-mini").unwrap();
        let b = client.resolve("gpt-4.1-mini").unwrap();
        let c = client.resolve("gpt-4.1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(c.model(), "gpt-4.1");
    }
}
