use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::config::{GenerationSettings, ModelCatalog, QualityConfig};
use crate::core::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::core::metrics;
use crate::core::participants;
use crate::core::quality::{self, QualityReport};
use crate::core::summarize::TranscriptSummarizer;
use crate::core::template::{StyleOptions, TemplateStore};

pub const TEMPERATURE: f32 = 0.7;
pub const TOP_P: f32 = 0.9;
const REPAIR_TEMPERATURE: f32 = 0.5;

const WRITER_SYSTEM_PROMPT: &str = "你是一位專業的專訪報導撰稿人，擅長將逐字稿轉化為具敘事感與邏輯結構的完整文章，\
     能精準控制篇幅與引用比例，符合企業／政府／教育等正式出版需求。";
const EDITOR_SYSTEM_PROMPT: &str = "你是專業編輯，負責調整文章結構與篇幅，不得改動事實內容。";

const NO_CONTEXT_PLACEHOLDER: &str = "（無特定描述）";
const NO_SUMMARY_PLACEHOLDER: &str = "（無特定摘要）";

/// One user action's worth of generation input. The API key lives in the
/// LLM client configuration, not here.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub subject: String,
    pub company: String,
    /// Raw 姓名／職稱／權重 lines.
    pub participants: String,
    pub transcript: String,
    pub summary_points: String,
    pub style_label: String,
    pub opening_style: String,
    pub opening_context: String,
    pub paragraphs: usize,
    pub word_count_range: (usize, usize),
    /// Logical model tier, resolved through the catalog.
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub article: String,
    pub report: QualityReport,
    pub repair_rounds: usize,
}

/// Everything the prompt renderer needs. Each historical prompt variant is
/// a parameterization of this one struct, not a separate code path.
#[derive(Debug, Clone)]
pub struct PromptSpec<'a> {
    pub style_label: &'a str,
    pub word_range: (usize, usize),
    pub paragraphs: usize,
    pub min_quotes: usize,
    pub require_heading_format: bool,
    pub opening_style: &'a str,
    pub opening_context: &'a str,
}

impl PromptSpec<'_> {
    pub fn constraints_text(&self) -> String {
        let mut lines = vec![
            format!(
                "全文字數必須在 {}–{} 字之間，低於範圍不可接受。",
                self.word_range.0, self.word_range.1
            ),
            format!(
                "主體段落必須固定為 {} 段，每段約 300–500 字，其他段落不可額外新增。",
                self.paragraphs
            ),
            format!(
                "全文至少包含 {} 則以上的受訪者直接引言（使用「」標示）。",
                self.min_quotes
            ),
        ];
        if self.require_heading_format {
            lines.push(
                "文章以主標題「# 標題」開頭，每個主體段落使用「## 小標題」格式標示，段落之間以空行分隔。"
                    .to_string(),
            );
        }
        lines.join("\n")
    }
}

pub struct ArticleGenerator {
    llm: Arc<dyn ChatModel>,
    templates: TemplateStore,
    style_options: Option<StyleOptions>,
    catalog: ModelCatalog,
    settings: GenerationSettings,
    quality: QualityConfig,
}

impl ArticleGenerator {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        templates: TemplateStore,
        style_options: Option<StyleOptions>,
        catalog: ModelCatalog,
        settings: GenerationSettings,
        quality: QualityConfig,
    ) -> Self {
        Self {
            llm,
            templates,
            style_options,
            catalog,
            settings,
            quality,
        }
    }

    /// Run the full drafting/repair pipeline for one request and return the
    /// final draft together with its quality report and the number of
    /// repair rounds performed.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        self.validate_request(request)?;

        let quality_config = self.effective_quality_config();
        let participant_info = participants::parse_participants(&request.participants);
        let participants_desc = participants::format_participants(&participant_info);

        // 長逐字稿安全模式
        let transcript_len = metrics::count_chars(&request.transcript);
        let transcript = if transcript_len > self.settings.transcript_threshold {
            log::info!(
                "Transcript length {} exceeds {}, compressing before generation",
                transcript_len,
                self.settings.transcript_threshold
            );
            let summarizer = TranscriptSummarizer::new(
                self.llm.clone(),
                self.catalog.resolve(&self.settings.summary_tier),
            )
            .with_max_segment_len(self.settings.max_segment_len);
            summarizer.summarize(&request.transcript).await?
        } else {
            request.transcript.clone()
        };

        let template_text = self.templates.load_article_template()?;
        let style_text = self.templates.load_style(&request.style_label)?;
        let opening_instructions = self
            .style_options
            .as_ref()
            .and_then(|options| options.instructions_for(&request.opening_style));

        let spec = PromptSpec {
            style_label: &request.style_label,
            word_range: request.word_count_range,
            paragraphs: request.paragraphs,
            min_quotes: quality_config.min_quotes.max(5),
            require_heading_format: true,
            opening_style: &request.opening_style,
            opening_context: &request.opening_context,
        };
        let checklist: &[String] = self
            .style_options
            .as_ref()
            .map(|options| options.quality_checklist.as_slice())
            .unwrap_or(&[]);
        let model = self.catalog.resolve(&request.model).to_string();

        let user_prompt = render_generation_prompt(
            &spec,
            &template_text,
            &style_text,
            opening_instructions,
            checklist,
            &participants_desc,
            &transcript,
            request,
        );

        log::info!("Drafting article with model {}", model);
        let mut article = self
            .call(&model, WRITER_SYSTEM_PROMPT, &user_prompt, TEMPERATURE)
            .await?;
        let mut report = quality::run_checks(
            &article,
            request.paragraphs,
            &participant_info,
            &quality_config,
        );

        let mut repair_rounds = 0;
        while !quality::hard_checks_passed(&report) && repair_rounds < self.settings.max_repairs {
            repair_rounds += 1;
            log::info!(
                "Hard checks failed, repair round {}/{}",
                repair_rounds,
                self.settings.max_repairs
            );
            let repair_prompt = render_repair_prompt(&spec, checklist, &article);
            article = self
                .call(&model, EDITOR_SYSTEM_PROMPT, &repair_prompt, REPAIR_TEMPERATURE)
                .await?;
            report = quality::run_checks(
                &article,
                request.paragraphs,
                &participant_info,
                &quality_config,
            );
        }

        Ok(GenerationOutcome {
            article,
            report,
            repair_rounds,
        })
    }

    /// The configured quality settings with the style-options forbidden
    /// phrases folded into the filler denylist.
    fn effective_quality_config(&self) -> QualityConfig {
        let mut config = self.quality.clone();
        if let Some(options) = &self.style_options {
            for phrase in &options.forbidden_phrases {
                if !config.filler_phrases.contains(phrase) {
                    config.filler_phrases.push(phrase.clone());
                }
            }
        }
        config
    }

    /// Hard precondition checks, all before any network call.
    fn validate_request(&self, request: &GenerationRequest) -> Result<()> {
        let required = [
            ("主題", request.subject.as_str()),
            ("企業", request.company.as_str()),
            ("逐字稿", request.transcript.as_str()),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            bail!("缺少必填欄位：{}", missing.join("、"));
        }

        if let Some(options) = &self.style_options {
            let fields = BTreeMap::from([
                ("subject", request.subject.as_str()),
                ("company", request.company.as_str()),
                ("participants", request.participants.as_str()),
                ("transcript", request.transcript.as_str()),
                ("summary_points", request.summary_points.as_str()),
                ("opening_context", request.opening_context.as_str()),
            ]);
            options.validate_context(&request.opening_style, &fields)?;
        }
        Ok(())
    }

    async fn call(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
    ) -> Result<String> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_prompt),
            ],
            temperature,
            top_p: TOP_P,
            max_output_tokens: self.settings.max_output_tokens,
        };
        self.llm.chat(request).await
    }
}

fn placeholder_if_empty<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

/// The style-options quality checklist rendered as an extra prompt
/// section, or nothing when the resource declares none.
fn checklist_section(quality_checklist: &[String]) -> String {
    if quality_checklist.is_empty() {
        return String::new();
    }
    let items = quality_checklist
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\n【品質檢核】\n{}", items)
}

fn render_generation_prompt(
    spec: &PromptSpec<'_>,
    template: &str,
    style_text: &str,
    opening_instructions: Option<&str>,
    quality_checklist: &[String],
    participants_desc: &str,
    transcript: &str,
    request: &GenerationRequest,
) -> String {
    let mut style_section = style_text.trim().to_string();
    if let Some(instructions) = opening_instructions {
        style_section.push_str("\n\n開場指引：");
        style_section.push_str(instructions);
    }

    format!(
        "請根據以下資訊撰寫完整專訪文章，並結合文章模板與風格要求作為參考：\n\
         \n\
         【文章資訊】\n\
         主題：{subject}\n\
         企業：{company}\n\
         段落數：{paragraphs}\n\
         開場風格：{opening_style}\n\
         採訪情境：{opening_context}\n\
         \n\
         【受訪者資訊】\n\
         {participants}\n\
         \n\
         【逐字稿內容】\n\
         {transcript}\n\
         \n\
         【重點摘要】\n\
         {summary_points}\n\
         \n\
         【文章模板】\n\
         {template}\n\
         \n\
         【文章風格要求（{style_label}）】\n\
         {style_section}\n\
         \n\
         【產出限制】\n\
         {constraints}{checklist}",
        subject = request.subject,
        company = request.company,
        paragraphs = spec.paragraphs,
        opening_style = spec.opening_style,
        opening_context = placeholder_if_empty(spec.opening_context, NO_CONTEXT_PLACEHOLDER),
        participants = participants_desc,
        transcript = transcript,
        summary_points = placeholder_if_empty(&request.summary_points, NO_SUMMARY_PLACEHOLDER),
        template = template,
        style_label = spec.style_label,
        style_section = style_section,
        constraints = spec.constraints_text(),
        checklist = checklist_section(quality_checklist),
    )
}

fn render_repair_prompt(
    spec: &PromptSpec<'_>,
    quality_checklist: &[String],
    article: &str,
) -> String {
    format!(
        "以下是初稿文章，請根據以下要求進行修正：\n\
         \n\
         {constraints}\n\
         保留原本的風格與事實內容，僅調整結構與篇幅。{checklist}\n\
         \n\
         初稿：\n\
         {article}",
        constraints = spec.constraints_text(),
        checklist = checklist_section(quality_checklist),
        article = article,
    )
}
