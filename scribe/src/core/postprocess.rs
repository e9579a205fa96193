use anyhow::Result;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::core::generator::{GenerationOutcome, GenerationRequest};
use crate::core::metrics::{self, HeadingOutline};
use crate::core::quality::QualityReport;

fn blank_run_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

fn heading_spacing_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([^\n])\n(#{1,3} )").unwrap())
}

/// Normalize an article before presenting or exporting it: unified
/// newlines, 「」 quotes, no trailing whitespace, at most one blank line
/// between blocks, and a blank line before every heading.
pub fn sanitize_markdown(md: &str) -> String {
    if md.is_empty() {
        return String::new();
    }

    let mut text = md.replace("\r\n", "\n").replace('\r', "\n");
    text = text.replace('“', "「").replace('”', "」");

    text = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    text = blank_run_pattern().replace_all(&text, "\n\n").to_string();
    text = heading_spacing_pattern()
        .replace_all(&text, "$1\n\n$2")
        .to_string();

    text.trim().to_string()
}

fn bold_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap())
}

fn italic_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*([^*]+)\*").unwrap())
}

fn inline_code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`]+)`").unwrap())
}

/// Plain-text rendering: heading markers and inline emphasis removed,
/// content and line structure kept.
pub fn strip_markdown(md: &str) -> String {
    let mut lines = Vec::new();
    for line in md.lines() {
        let hashes = line.chars().take_while(|c| *c == '#').count();
        let line = if (1..=6).contains(&hashes) && line.as_bytes().get(hashes) == Some(&b' ') {
            &line[hashes + 1..]
        } else {
            line
        };
        lines.push(line);
    }
    let mut text = lines.join("\n");
    text = bold_pattern().replace_all(&text, "$1").to_string();
    text = italic_pattern().replace_all(&text, "$1").to_string();
    text = inline_code_pattern().replace_all(&text, "$1").to_string();
    text
}

/// Human-readable summary of one generation outcome.
pub fn report_summary_text(outcome: &GenerationOutcome, word_range: (usize, usize)) -> String {
    let article = &outcome.article;
    let word_count = metrics::count_chars(article);
    let quotes = metrics::count_quote_pairs(article);
    let headings = metrics::extract_headings(article);

    let mut lines = vec![
        format!(
            "字數：{}（{}–{} 合格：{}）",
            word_count,
            word_range.0,
            word_range.1,
            outcome.report.passed("word_count_ok")
        ),
        format!("段落數（以空行計）：{}", metrics::count_paragraphs(article)),
        format!("小標題數（##）：{}", headings.h2.len()),
        format!("引號數（成對計算）：{}", quotes),
        format!("自動修稿次數：{}", outcome.repair_rounds),
    ];
    for (name, passed) in outcome.report.iter() {
        lines.push(format!("- {}：{}", name, if passed { "通過" } else { "未通過" }));
    }
    lines.join("\n")
}

#[derive(Debug, Serialize)]
struct MetaBundle<'a> {
    subject: &'a str,
    company: &'a str,
    participants: &'a str,
    opening_style: &'a str,
    headings: HeadingOutline,
    checks: &'a QualityReport,
    auto_edit_retries: usize,
    constraints: MetaConstraints,
    article_word_count: usize,
    generated_at: String,
}

#[derive(Debug, Serialize)]
struct MetaConstraints {
    word_count_range: (usize, usize),
    paragraphs: usize,
}

/// Structured JSON bundle combining the request metadata, the article's
/// outline and the quality report.
pub fn build_meta_bundle(
    request: &GenerationRequest,
    outcome: &GenerationOutcome,
) -> Result<String> {
    let bundle = MetaBundle {
        subject: &request.subject,
        company: &request.company,
        participants: &request.participants,
        opening_style: &request.opening_style,
        headings: metrics::extract_headings(&outcome.article),
        checks: &outcome.report,
        auto_edit_retries: outcome.repair_rounds,
        constraints: MetaConstraints {
            word_count_range: request.word_count_range,
            paragraphs: request.paragraphs,
        },
        article_word_count: metrics::count_chars(&outcome.article),
        generated_at: chrono::Utc::now().to_rfc3339(),
    };
    Ok(serde_json::to_string_pretty(&bundle)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::QualityConfig;
    use crate::core::quality;

    #[test]
    fn sanitize_unifies_quotes_and_blank_lines() {
        let raw = "# 標題\n段落一結尾有空白   \n\n\n\n“引言內容”\n## 小標題\n內文";
        let clean = sanitize_markdown(raw);
        assert!(clean.contains("「引言內容」"));
        assert!(!clean.contains("\n\n\n"));
        assert!(!clean.contains("   \n"));
        assert!(clean.contains("\n\n## 小標題"));
    }

    #[test]
    fn sanitize_keeps_cjk_count_stable() {
        let raw = "你好 world\n";
        let clean = sanitize_markdown(raw);
        assert_eq!(metrics::count_chars(raw), metrics::count_chars(&clean));
    }

    #[test]
    fn strip_removes_markers_but_keeps_text() {
        let md = "# 標題\n\n## 小節\n\n內文有**粗體**、*斜體*與`程式碼`。";
        let plain = strip_markdown(md);
        assert!(plain.contains("標題"));
        assert!(plain.contains("小節"));
        assert!(plain.contains("內文有粗體、斜體與程式碼。"));
        assert!(!plain.contains('#'));
        assert!(!plain.contains('*'));
        assert!(!plain.contains('`'));
    }

    #[test]
    fn meta_bundle_carries_checks_and_constraints() {
        let request = GenerationRequest {
            subject: "主題".to_string(),
            company: "公司".to_string(),
            participants: String::new(),
            transcript: "逐字稿".to_string(),
            summary_points: String::new(),
            style_label: "企業".to_string(),
            opening_style: "直述主題".to_string(),
            opening_context: String::new(),
            paragraphs: 3,
            word_count_range: (1500, 2000),
            model: "standard".to_string(),
        };
        let article = "# 標題\n\n## 一\n\n「內容」".to_string();
        let report = quality::run_checks(&article, 3, &[], &QualityConfig::default());
        let outcome = GenerationOutcome {
            article,
            report,
            repair_rounds: 1,
        };

        let json = build_meta_bundle(&request, &outcome).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["subject"], "主題");
        assert_eq!(value["auto_edit_retries"], 1);
        assert_eq!(value["constraints"]["word_count_range"][0], 1500);
        assert_eq!(value["headings"]["h2"][0], "一");
        assert!(value["checks"].get("word_count_ok").is_some());
        assert!(value["generated_at"].is_string());
    }

    #[test]
    fn report_summary_mentions_retries_and_checks() {
        let request_range = (1500, 2000);
        let article = "# 標題\n\n## 一\n\n「內容」".to_string();
        let report = quality::run_checks(&article, 1, &[], &QualityConfig::default());
        let outcome = GenerationOutcome {
            article,
            report,
            repair_rounds: 2,
        };
        let text = report_summary_text(&outcome, request_range);
        assert!(text.contains("自動修稿次數：2"));
        assert!(text.contains("word_count_ok"));
    }
}
