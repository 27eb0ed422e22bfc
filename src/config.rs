//! Configuration types for document analysis.
//!
//! Every user-adjustable knob of a run lives in [`AnalysisConfig`], built via
//! its [`AnalysisConfigBuilder`]. The inference client itself is *not* part
//! of the config: it is constructed once and passed to the entry points
//! explicitly (see [`crate::inference`]).

use crate::error::AnalyzerError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upscale factor applied to both axes when rasterising a PDF page.
///
/// 2× keeps typewritten and stamped text on scanned documents legible for
/// the vision model.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Configuration for a document analysis run.
///
/// # Example
/// ```rust
/// use edgequake_doc_analyzer::{AnalysisConfig, ModelChoice};
///
/// let config = AnalysisConfig::builder()
///     .model(ModelChoice::Gemini15Pro)
///     .page_limit(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.page_limit, 3);
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Remote model used for page analysis and the summary.
    pub model: ModelChoice,

    /// LLM provider name (e.g. "gemini", "openai"). `None` = auto-detect.
    pub provider_name: Option<String>,

    /// Maximum number of pages to analyse. `0` means every page.
    pub page_limit: usize,

    /// Custom analysis instruction. `None` uses
    /// [`crate::prompts::DOCUMENT_ANALYSIS_PROMPT`].
    pub instruction: Option<String>,

    /// Upscale factor for PDF page rendering. Default: 2.0.
    pub render_scale: f32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Sampling temperature for every inference call. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// What happens when the summary call fails. Default: [`SummaryPolicy::Surface`].
    pub summary_policy: SummaryPolicy,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives per-page progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: ModelChoice::default(),
            provider_name: None,
            page_limit: 0,
            instruction: None,
            render_scale: DEFAULT_RENDER_SCALE,
            password: None,
            temperature: 0.2,
            max_tokens: 4096,
            summary_policy: SummaryPolicy::default(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("page_limit", &self.page_limit)
            .field("instruction", &self.instruction.as_ref().map(|_| "<custom>"))
            .field("render_scale", &self.render_scale)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("summary_policy", &self.summary_policy)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// The instruction sent with every page image.
    pub fn instruction(&self) -> &str {
        self.instruction
            .as_deref()
            .unwrap_or(crate::prompts::DOCUMENT_ANALYSIS_PROMPT)
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: ModelChoice) -> Self {
        self.config.model = model;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn page_limit(mut self, limit: usize) -> Self {
        self.config.page_limit = limit;
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
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

    pub fn summary_policy(mut self, policy: SummaryPolicy) -> Self {
        self.config.summary_policy = policy;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalyzerError> {
        let c = &self.config;
        if !c.render_scale.is_finite() || c.render_scale <= 0.0 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "render scale must be a positive number, got {}",
                c.render_scale
            )));
        }
        if let Some(ref instruction) = c.instruction {
            if instruction.trim().is_empty() {
                return Err(AnalyzerError::InvalidConfig(
                    "custom instruction must not be empty".into(),
                ));
            }
        }
        if let ModelChoice::Custom(ref id) = c.model {
            if id.trim().is_empty() {
                return Err(AnalyzerError::InvalidConfig("model id must not be empty".into()));
            }
        }
        if c.max_tokens == 0 {
            return Err(AnalyzerError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Remote model used for analysis.
///
/// The named variants are the Gemini vision models the analyzer is tuned
/// for. `Custom` passes any other model id through to the provider, which is
/// how OpenAI, Anthropic or local models are selected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelChoice {
    /// `gemini-1.5-flash` (default)
    #[default]
    Gemini15Flash,
    /// `gemini-1.5-pro`
    Gemini15Pro,
    /// `gemini-pro-vision`
    GeminiProVision,
    /// `gemini-2.0-flash`
    Gemini20Flash,
    /// Any other provider model id.
    Custom(String),
}

impl ModelChoice {
    /// The enumerated choices, in the order they are offered to users.
    pub const SUPPORTED: [ModelChoice; 4] = [
        ModelChoice::Gemini15Flash,
        ModelChoice::Gemini15Pro,
        ModelChoice::GeminiProVision,
        ModelChoice::Gemini20Flash,
    ];

    /// Model id sent to the provider.
    pub fn id(&self) -> &str {
        match self {
            ModelChoice::Gemini15Flash => "gemini-1.5-flash",
            ModelChoice::Gemini15Pro => "gemini-1.5-pro",
            ModelChoice::GeminiProVision => "gemini-pro-vision",
            ModelChoice::Gemini20Flash => "gemini-2.0-flash",
            ModelChoice::Custom(id) => id,
        }
    }

    /// `true` for the Gemini family, which selects the Gemini provider when
    /// none is named.
    pub fn is_gemini(&self) -> bool {
        self.id().starts_with("gemini")
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelChoice {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AnalyzerError::InvalidConfig("model id must not be empty".into()));
        }
        Ok(Self::SUPPORTED
            .into_iter()
            .find(|m| m.id().eq_ignore_ascii_case(s))
            .unwrap_or_else(|| ModelChoice::Custom(s.to_string())))
    }
}

/// How the cross-page summary treats a failed inference call.
///
/// Page analysis always tolerates failures; for the summary both behaviours
/// are reasonable, so the caller chooses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SummaryPolicy {
    /// Report the failure to the caller; no full report is produced. (default)
    #[default]
    Surface,
    /// Substitute `"Error generating summary: <cause>"` and still build the report.
    Tolerate,
}

/// Number of pages a run processes: every page when `limit == 0`,
/// otherwise `min(limit, page_count)`.
pub fn pages_to_process(limit: usize, page_count: usize) -> usize {
    if limit == 0 {
        page_count
    } else {
        limit.min(page_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AnalysisConfig::default();
        assert_eq!(c.model, ModelChoice::Gemini15Flash);
        assert_eq!(c.page_limit, 0);
        assert_eq!(c.render_scale, 2.0);
        assert_eq!(c.summary_policy, SummaryPolicy::Surface);
        assert_eq!(c.instruction(), crate::prompts::DOCUMENT_ANALYSIS_PROMPT);
    }

    #[test]
    fn builder_rejects_bad_scale() {
        assert!(AnalysisConfig::builder().render_scale(0.0).build().is_err());
        assert!(AnalysisConfig::builder().render_scale(-1.5).build().is_err());
        assert!(AnalysisConfig::builder().render_scale(f32::NAN).build().is_err());
        assert!(AnalysisConfig::builder().render_scale(1.0).build().is_ok());
    }

    #[test]
    fn builder_rejects_blank_instruction() {
        let err = AnalysisConfig::builder().instruction("   ").build().unwrap_err();
        assert!(err.to_string().contains("instruction"));

        let c = AnalysisConfig::builder()
            .instruction("List every name.")
            .build()
            .unwrap();
        assert_eq!(c.instruction(), "List every name.");
    }

    #[test]
    fn temperature_is_clamped() {
        let c = AnalysisConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn debug_redacts_password() {
        let c = AnalysisConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn model_choice_parsing() {
        assert_eq!("gemini-1.5-pro".parse::<ModelChoice>().unwrap(), ModelChoice::Gemini15Pro);
        assert_eq!(
            "GEMINI-2.0-FLASH".parse::<ModelChoice>().unwrap(),
            ModelChoice::Gemini20Flash
        );
        assert_eq!(
            "gpt-4.1-mini".parse::<ModelChoice>().unwrap(),
            ModelChoice::Custom("gpt-4.1-mini".into())
        );
        assert!("  ".parse::<ModelChoice>().is_err());
        assert!(ModelChoice::GeminiProVision.is_gemini());
        assert!(!ModelChoice::Custom("gpt-4.1".into()).is_gemini());
    }

    #[test]
    fn page_count_rule() {
        assert_eq!(pages_to_process(0, 7), 7);
        assert_eq!(pages_to_process(2, 5), 2);
        assert_eq!(pages_to_process(9, 5), 5);
        assert_eq!(pages_to_process(5, 5), 5);
        assert_eq!(pages_to_process(0, 0), 0);
        assert_eq!(pages_to_process(3, 0), 0);
    }
}
