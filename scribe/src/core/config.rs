use serde::Deserialize;
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub models: ModelCatalog,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub resources: ResourceSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default)]
    pub token_limit_style: TokenLimitStyle,
}

/// Which parameter name the provider expects for the output token budget.
/// Older chat-completions endpoints take `max_tokens`, newer ones
/// `max_completion_tokens`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenLimitStyle {
    #[default]
    MaxTokens,
    MaxCompletionTokens,
}

/// Explicit transport settings, injected into the LLM client at startup.
/// Proxy behavior is decided here and nowhere else; library code never
/// touches proxy environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub proxy_url: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            proxy_url: None,
        }
    }
}

/// The one authoritative mapping from logical model tier to concrete
/// provider model id.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelCatalog {
    pub fast: String,
    pub standard: String,
    pub premium: String,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            fast: "gpt-4o-mini".to_string(),
            standard: "gpt-4o".to_string(),
            premium: "gpt-4-turbo".to_string(),
        }
    }
}

impl ModelCatalog {
    /// Resolve a tier name to a concrete model id. Unknown tiers fall back
    /// to the standard tier with a logged warning, never silently.
    pub fn resolve(&self, tier: &str) -> &str {
        match tier {
            "fast" => &self.fast,
            "standard" => &self.standard,
            "premium" => &self.premium,
            other => {
                log::warn!(
                    "Unknown model tier '{}', falling back to standard ({})",
                    other,
                    self.standard
                );
                &self.standard
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationSettings {
    /// Transcripts longer than this (counted characters) are summarized
    /// before generation.
    pub transcript_threshold: usize,
    /// Upper bound for one summarization chunk. Boundaries fall on line ends.
    pub max_segment_len: usize,
    /// Repair rounds after the initial draft.
    pub max_repairs: usize,
    pub max_output_tokens: u32,
    /// Tier used for transcript summarization calls.
    pub summary_tier: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            transcript_threshold: 8000,
            max_segment_len: 5000,
            max_repairs: 2,
            max_output_tokens: 4000,
            summary_tier: "fast".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QualityConfig {
    /// Inclusive counted-character range for a passing draft.
    pub word_range: (usize, usize),
    pub min_quotes: usize,
    /// Allowed deviation of the section count from the requested one.
    pub paragraph_tolerance: usize,
    /// Cliché phrases a draft must not contain.
    pub filler_phrases: Vec<String>,
    /// Check names disabled for this deployment.
    pub disabled: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            word_range: (1500, 2000),
            min_quotes: 1,
            paragraph_tolerance: 1,
            filler_phrases: default_filler_phrases(),
            disabled: Vec::new(),
        }
    }
}

pub fn default_filler_phrases() -> Vec<String> {
    ["非常成功", "十分重要", "極為關鍵", "相當優秀", "令人感動", "展現非凡"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ResourceSettings {
    /// Directory holding templates/, styles/ and style_options.json.
    pub root: String,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            root: "resources".to_string(),
        }
    }
}

fn default_max_attempts() -> usize {
    2
}

pub fn load_config(path: &str) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
[llm]
api_url = "http://localhost:1234/v1"
"#,
        )
        .unwrap();

        assert_eq!(config.llm.max_attempts, 2);
        assert_eq!(config.llm.token_limit_style, TokenLimitStyle::MaxTokens);
        assert_eq!(config.http.timeout_secs, 120);
        assert_eq!(config.generation.transcript_threshold, 8000);
        assert_eq!(config.generation.max_segment_len, 5000);
        assert_eq!(config.generation.max_repairs, 2);
        assert_eq!(config.quality.word_range, (1500, 2000));
        assert_eq!(config.quality.min_quotes, 1);
        assert!(!config.quality.filler_phrases.is_empty());
    }

    #[test]
    fn token_limit_style_parses_both_spellings() {
        let config: Config = toml::from_str(
            r#"
[llm]
api_url = "http://localhost:1234/v1"
token_limit_style = "max_completion_tokens"
"#,
        )
        .unwrap();
        assert_eq!(
            config.llm.token_limit_style,
            TokenLimitStyle::MaxCompletionTokens
        );
    }

    #[test]
    fn catalog_resolves_tiers_and_falls_back() {
        let catalog = ModelCatalog::default();
        assert_eq!(catalog.resolve("fast"), "gpt-4o-mini");
        assert_eq!(catalog.resolve("premium"), "gpt-4-turbo");
        assert_eq!(catalog.resolve("hyperspeed"), catalog.standard.as_str());
    }
}
