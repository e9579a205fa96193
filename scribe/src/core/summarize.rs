use anyhow::Result;
use std::sync::Arc;

use crate::core::llm::{ChatMessage, ChatModel, ChatRequest};

pub const DEFAULT_MAX_SEGMENT_LEN: usize = 5000;

const SUMMARY_SYSTEM_PROMPT: &str = "你是一位摘要專家，請保留人物觀點、數據、事件邏輯。";
const SUMMARY_TEMPERATURE: f32 = 0.5;
const SUMMARY_TOP_P: f32 = 0.9;
const SUMMARY_MAX_TOKENS: u32 = 800;
const PLACEHOLDER_HEAD_CHARS: usize = 200;

/// Compresses oversized transcripts chunk by chunk. One LLM call per chunk;
/// a failed chunk degrades to a visible placeholder instead of aborting the
/// whole summarization.
pub struct TranscriptSummarizer {
    llm: Arc<dyn ChatModel>,
    model: String,
    max_segment_len: usize,
}

impl TranscriptSummarizer {
    pub fn new(llm: Arc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            max_segment_len: DEFAULT_MAX_SEGMENT_LEN,
        }
    }

    pub fn with_max_segment_len(mut self, max_segment_len: usize) -> Self {
        self.max_segment_len = max_segment_len;
        self
    }

    pub async fn summarize(&self, transcript: &str) -> Result<String> {
        let segments = split_segments(transcript, self.max_segment_len);
        let total = segments.len();
        let mut summaries = Vec::with_capacity(total);

        for (idx, segment) in segments.iter().enumerate() {
            log::info!("Summarizing transcript segment {}/{}", idx + 1, total);
            let request = ChatRequest {
                model: self.model.clone(),
                messages: vec![
                    ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
                    ChatMessage::user(format!(
                        "請摘要以下逐字稿內容，限 300–400 字：\n{}",
                        segment
                    )),
                ],
                temperature: SUMMARY_TEMPERATURE,
                top_p: SUMMARY_TOP_P,
                max_output_tokens: SUMMARY_MAX_TOKENS,
            };
            match self.llm.chat(request).await {
                Ok(summary) => summaries.push(summary.trim().to_string()),
                Err(e) => {
                    log::warn!("Segment {}/{} summarization failed: {}", idx + 1, total, e);
                    summaries.push(failure_placeholder(segment, &e));
                }
            }
        }

        Ok(summaries.join("\n\n"))
    }
}

fn failure_placeholder(segment: &str, error: &anyhow::Error) -> String {
    let head: String = segment.chars().take(PLACEHOLDER_HEAD_CHARS).collect();
    format!("[摘要失敗：{}]\n{}…", error, head)
}

/// Split a transcript into segments whose accumulated length stays under
/// `max_len`. A boundary is only inserted after a completed line, never
/// mid-line.
pub fn split_segments(transcript: &str, max_len: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    for line in transcript.lines() {
        buffer.push_str(line);
        buffer.push('\n');
        buffer_chars += line.chars().count() + 1;
        if buffer_chars > max_len {
            segments.push(buffer.trim().to_string());
            buffer.clear();
            buffer_chars = 0;
        }
    }
    if !buffer.trim().is_empty() {
        segments.push(buffer.trim().to_string());
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::testing::ScriptedModel;

    #[test]
    fn segments_break_only_on_line_boundaries() {
        let transcript = "一二三四五\n六七八九十\n甲乙丙丁戊\n";
        let segments = split_segments(transcript, 8);
        // Each line is 6 counted units with its newline; the boundary falls
        // after the line that pushes the buffer past the limit.
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "一二三四五\n六七八九十");
        assert_eq!(segments[1], "甲乙丙丁戊");
    }

    #[test]
    fn short_transcript_is_one_segment() {
        let segments = split_segments("只有一行\n", 5000);
        assert_eq!(segments, vec!["只有一行"]);
    }

    #[tokio::test]
    async fn one_call_per_segment_in_order() {
        let transcript = "第一段訪談內容第一段訪談內容\n第二段訪談內容第二段訪談內容\n";
        let model = Arc::new(ScriptedModel::new(vec![Ok("摘要一"), Ok("摘要二")]));
        let summarizer =
            TranscriptSummarizer::new(model.clone(), "gpt-4o-mini").with_max_segment_len(10);

        let segments = split_segments(transcript, 10);
        assert_eq!(segments.len(), 2);

        let compressed = summarizer.summarize(transcript).await.unwrap();
        assert_eq!(model.call_count(), 2);
        assert_eq!(compressed, "摘要一\n\n摘要二");
    }

    #[tokio::test]
    async fn failed_segment_becomes_placeholder_without_aborting() {
        let transcript = "第一段訪談內容第一段訪談內容\n第二段訪談內容第二段訪談內容\n";
        let model = Arc::new(ScriptedModel::new(vec![Err("rate limited"), Ok("摘要二")]));
        let summarizer =
            TranscriptSummarizer::new(model.clone(), "gpt-4o-mini").with_max_segment_len(10);

        let compressed = summarizer.summarize(transcript).await.unwrap();
        assert_eq!(model.call_count(), 2);

        let parts: Vec<&str> = compressed.split("\n\n").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains("摘要失敗"));
        assert!(parts[0].contains("rate limited"));
        assert!(parts[0].contains("第一段訪談內容"));
        assert_eq!(parts[1], "摘要二");
    }
}
