use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use scribe::core::config::load_config;
use scribe::core::generator::{ArticleGenerator, GenerationRequest};
use scribe::core::llm::LlmClient;
use scribe::core::postprocess;
use scribe::core::template::TemplateStore;

/// One generation request as read from disk. The transcript can be inline
/// or referenced as a separate file.
#[derive(Debug, Deserialize)]
struct RequestFile {
    subject: String,
    company: String,
    #[serde(default)]
    participants: String,
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    transcript_file: Option<String>,
    #[serde(default)]
    summary_points: String,
    #[serde(default = "default_style_label")]
    style_label: String,
    #[serde(default = "default_opening_style")]
    opening_style: String,
    #[serde(default)]
    opening_context: String,
    #[serde(default = "default_paragraphs")]
    paragraphs: usize,
    #[serde(default = "default_word_count_range")]
    word_count_range: (usize, usize),
    #[serde(default = "default_model")]
    model: String,
}

fn default_style_label() -> String {
    "企業".to_string()
}

fn default_opening_style() -> String {
    "直述主題".to_string()
}

fn default_paragraphs() -> usize {
    4
}

fn default_word_count_range() -> (usize, usize) {
    (1500, 2000)
}

fn default_model() -> String {
    "standard".to_string()
}

fn load_request(path: &str) -> Result<GenerationRequest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path))?;
    let file: RequestFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse request file {}", path))?;

    let transcript = match &file.transcript_file {
        Some(transcript_path) if !transcript_path.trim().is_empty() => {
            fs::read_to_string(transcript_path)
                .with_context(|| format!("Failed to read transcript file {}", transcript_path))?
        }
        _ => file.transcript.clone(),
    };

    Ok(GenerationRequest {
        subject: file.subject,
        company: file.company,
        participants: file.participants,
        transcript,
        summary_points: file.summary_points,
        style_label: file.style_label,
        opening_style: file.opening_style,
        opening_context: file.opening_context,
        paragraphs: file.paragraphs,
        word_count_range: file.word_count_range,
        model: file.model,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config_path = "config.toml";

    // Write a commented starter config on first run for ease of setup
    if !Path::new(config_path).exists() {
        let starter_config = r#"[llm]
api_url = "https://api.openai.com/v1"
# api_key = "sk-..."
# token_limit_style = "max_completion_tokens"

[http]
timeout_secs = 120
# proxy_url = "http://127.0.0.1:7890"

[models]
fast = "gpt-4o-mini"
standard = "gpt-4o"
premium = "gpt-4-turbo"

[generation]
transcript_threshold = 8000
max_segment_len = 5000
max_repairs = 2

[quality]
word_range = [1500, 2000]
min_quotes = 1

[resources]
root = "resources"
"#;
        fs::write(config_path, starter_config)?;
        log::info!("Wrote starter config to {}", config_path);
    }

    let config = load_config(config_path)?;

    let request_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "request.toml".to_string());
    let request = load_request(&request_path)?;

    let llm = Arc::new(LlmClient::new(config.llm.clone(), &config.http));
    let templates = TemplateStore::new(&config.resources.root);
    let style_options = if templates.has_style_options() {
        Some(templates.load_style_options()?)
    } else {
        None
    };

    let generator = ArticleGenerator::new(
        llm,
        templates,
        style_options,
        config.models.clone(),
        config.generation.clone(),
        config.quality.clone(),
    );

    log::info!("Generating article for subject: {}", request.subject);
    let outcome = generator.generate(&request).await?;

    let article = postprocess::sanitize_markdown(&outcome.article);
    println!("{}\n", article);
    println!("=== 檢查結果 ===");
    println!(
        "{}",
        postprocess::report_summary_text(&outcome, request.word_count_range)
    );

    fs::write("article.md", &article)?;
    fs::write("article.txt", postprocess::strip_markdown(&article))?;
    fs::write(
        "meta.json",
        postprocess::build_meta_bundle(&request, &outcome)?,
    )?;
    log::info!("Wrote article.md, article.txt and meta.json");

    Ok(())
}
