use anyhow::{bail, Result};
use std::sync::Arc;

use crate::core::blocks::{Block, BlockRole, BLOCK_HEADING_PREFIX};
use crate::core::generator::{GenerationRequest, TOP_P};
use crate::core::llm::{ChatMessage, ChatModel, ChatRequest};

/// Clip length for neighboring-context excerpts.
pub const CONTEXT_CLIP_LEN: usize = 200;
/// Clip length for the target block's own excerpt.
pub const TARGET_CLIP_LEN: usize = 400;

const REGEN_SYSTEM_PROMPT: &str = "你是專業的專訪文章編輯，負責重寫指定段落，維持全文語氣與風格一致，不得改動事實內容。";
const REGEN_TEMPERATURE: f32 = 0.7;
const REGEN_MAX_TOKENS: u32 = 1200;

/// The request metadata carried into block regeneration prompts.
#[derive(Debug, Clone)]
pub struct ArticleMeta {
    pub subject: String,
    pub company: String,
    pub participants: String,
    pub summary_points: String,
    pub opening_style: String,
    pub opening_context: String,
}

impl From<&GenerationRequest> for ArticleMeta {
    fn from(request: &GenerationRequest) -> Self {
        Self {
            subject: request.subject.clone(),
            company: request.company.clone(),
            participants: request.participants.clone(),
            summary_points: request.summary_points.clone(),
            opening_style: request.opening_style.clone(),
            opening_context: request.opening_context.clone(),
        }
    }
}

fn length_target(role: BlockRole) -> &'static str {
    match role {
        BlockRole::Opening | BlockRole::Closing => "150–250",
        BlockRole::Body => "300–500",
    }
}

pub struct BlockRegenerator {
    llm: Arc<dyn ChatModel>,
    model: String,
}

impl BlockRegenerator {
    pub fn new(llm: Arc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    /// Rewrite one block in context. An out-of-range index is a hard error
    /// raised before any network call; any failure after that returns the
    /// original block unchanged.
    pub async fn regenerate(
        &self,
        index: usize,
        blocks: &[Block],
        meta: &ArticleMeta,
    ) -> Result<Block> {
        if index >= blocks.len() {
            bail!("段落索引超出範圍：{}（共 {} 段）", index, blocks.len());
        }
        let original = &blocks[index];

        match self.regenerate_inner(index, blocks, meta).await {
            Ok(block) => Ok(block),
            Err(e) => {
                log::warn!(
                    "Regenerating block {} failed: {}. Keeping the original block.",
                    index,
                    e
                );
                Ok(original.clone())
            }
        }
    }

    async fn regenerate_inner(
        &self,
        index: usize,
        blocks: &[Block],
        meta: &ArticleMeta,
    ) -> Result<Block> {
        let original = &blocks[index];
        let prev = index.checked_sub(1).and_then(|i| blocks.get(i));
        let next = blocks.get(index + 1);

        let prompt = build_regen_prompt(original, prev, next, meta);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(REGEN_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ],
            temperature: REGEN_TEMPERATURE,
            top_p: TOP_P,
            max_output_tokens: REGEN_MAX_TOKENS,
        };
        let response = self.llm.chat(request).await?;
        Ok(parse_regenerated_block(&response, original))
    }
}

/// The response should open with a `### ` heading carrying the new title.
/// Without one, the original title is kept and the whole response becomes
/// the content.
fn parse_regenerated_block(response: &str, original: &Block) -> Block {
    let trimmed = response.trim();
    if let Some(first_line) = trimmed.lines().next() {
        if let Some(title) = first_line.trim_end().strip_prefix(BLOCK_HEADING_PREFIX) {
            let content = trimmed
                .lines()
                .skip(1)
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string();
            return Block {
                role: original.role,
                title: title.trim().to_string(),
                content,
            };
        }
    }
    Block {
        role: original.role,
        title: original.title.clone(),
        content: trimmed.to_string(),
    }
}

fn build_regen_prompt(
    original: &Block,
    prev: Option<&Block>,
    next: Option<&Block>,
    meta: &ArticleMeta,
) -> String {
    let mut sections = Vec::new();

    sections.push(format!(
        "【文章資訊】\n主題：{}\n企業：{}\n開場風格：{}\n採訪情境：{}",
        meta.subject,
        meta.company,
        meta.opening_style,
        if meta.opening_context.trim().is_empty() {
            "（無特定描述）"
        } else {
            meta.opening_context.as_str()
        }
    ));

    if !meta.participants.trim().is_empty() {
        sections.push(format!("【受訪者清單】\n{}", meta.participants.trim()));
    }
    if !meta.summary_points.trim().is_empty() {
        sections.push(format!("【重點摘要】\n{}", meta.summary_points.trim()));
    }

    if let Some(prev) = prev {
        sections.push(format!(
            "【上一段（僅供銜接參考，不可改寫）】\n### {}\n{}",
            prev.title,
            clip_excerpt(&prev.content, CONTEXT_CLIP_LEN)
        ));
    }
    if let Some(next) = next {
        sections.push(format!(
            "【下一段（僅供銜接參考，不可改寫）】\n### {}\n{}",
            next.title,
            clip_excerpt(&next.content, CONTEXT_CLIP_LEN)
        ));
    }

    sections.push(format!(
        "【重寫目標段落】\n### {}\n{}",
        original.title,
        clip_excerpt(&original.content, TARGET_CLIP_LEN)
    ));

    sections.push(format!(
        "【重寫要求】\n\
         1. 僅重寫目標段落，篇幅約 {} 字。\n\
         2. 與上下段落自然銜接，不得重複其內容。\n\
         3. 第一行以「### 小標題」格式輸出段落標題，之後為段落內文。",
        length_target(original.role)
    ));

    sections.join("\n\n")
}

/// Clip `text` to roughly `limit` characters. Prefers cutting after
/// sentence-terminal punctuation (keeping at least 60% of the limit), then
/// after clause punctuation (at least 70%), then a hard cutoff; all but the
/// sentence cut are marked with an ellipsis.
pub fn clip_excerpt(text: &str, limit: usize) -> String {
    const SENTENCE_ENDS: &[char] = &['。', '！', '？', '!', '?', '.'];
    const CLAUSE_ENDS: &[char] = &['，', '、', '；', ',', ';'];

    let chars: Vec<char> = text.trim().chars().collect();
    if chars.len() <= limit {
        return chars.into_iter().collect();
    }
    let window = &chars[..limit];

    let sentence_floor = limit * 6 / 10;
    if let Some(pos) = rfind_any(window, SENTENCE_ENDS) {
        if pos + 1 >= sentence_floor {
            return window[..=pos].iter().collect();
        }
    }

    let clause_floor = limit * 7 / 10;
    if let Some(pos) = rfind_any(window, CLAUSE_ENDS) {
        if pos + 1 >= clause_floor {
            let mut clipped: String = window[..=pos].iter().collect();
            clipped.push('…');
            return clipped;
        }
    }

    let mut clipped: String = window.iter().collect();
    clipped.push('…');
    clipped
}

fn rfind_any(window: &[char], needles: &[char]) -> Option<usize> {
    window.iter().rposition(|c| needles.contains(c))
}
