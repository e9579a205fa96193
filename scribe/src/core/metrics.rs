use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Count every character after removing spaces and newlines. CJK and Latin
/// characters count equally; this is the single counting convention used by
/// both the summarizer trigger and the quality checker.
pub fn count_chars(text: &str) -> usize {
    text.chars().filter(|c| !matches!(c, ' ' | '\n')).count()
}

/// Number of blank-line-separated blocks that are non-empty and not pure
/// heading lines.
pub fn count_paragraphs(text: &str) -> usize {
    text.split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty() && !starts_with_heading(block))
        .count()
}

fn starts_with_heading(block: &str) -> bool {
    let hashes = block.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && block.as_bytes().get(hashes) == Some(&b' ')
}

fn quote_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new("「[^」]+」").unwrap(),
            Regex::new("\"[^\"]+\"").unwrap(),
            Regex::new("'[^']+'").unwrap(),
        ]
    })
}

/// Matched quote spans across the three supported delimiter styles
/// (「…」, "…", '…'); each matched span counts once.
pub fn count_quote_pairs(text: &str) -> usize {
    quote_patterns()
        .iter()
        .map(|re| re.find_iter(text).count())
        .sum()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeadingOutline {
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
}

/// Headings grouped by marker depth, in document order.
pub fn extract_headings(text: &str) -> HeadingOutline {
    let mut outline = HeadingOutline::default();
    for line in text.lines() {
        let line = line.trim_end();
        if let Some(rest) = line.strip_prefix("### ") {
            outline.h3.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("## ") {
            outline.h2.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("# ") {
            outline.h1.push(rest.trim().to_string());
        }
    }
    outline
}

/// Lines that are level-2 headings. The quality checker uses this as the
/// section count of a draft.
pub fn count_sections(text: &str) -> usize {
    text.lines()
        .filter(|line| {
            let line = line.trim_start();
            line.starts_with("## ") && !line.starts_with("###")
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_chars_ignores_spaces_and_newlines() {
        assert_eq!(count_chars("你好 world\n"), 7);
        assert_eq!(count_chars("   \n  "), 0);
        assert_eq!(count_chars("你好\nworld"), 7);
    }

    #[test]
    fn paragraphs_exclude_empty_and_heading_blocks() {
        let md = "# 主標題\n\n## 小標題\n\n第一段內容。\n\n第二段內容。\n\n\n";
        assert_eq!(count_paragraphs(md), 2);
    }

    #[test]
    fn quote_pairs_count_all_three_styles() {
        let text = "他說「品質第一」，又說 \"never settle\"，最後是 '一句話'。";
        assert_eq!(count_quote_pairs(text), 3);
    }

    #[test]
    fn unbalanced_quotes_do_not_count() {
        assert_eq!(count_quote_pairs("他說「品質第一"), 0);
    }

    #[test]
    fn headings_grouped_by_level_in_order() {
        let md = "# 標題\n\n## 第一節\n\n### 細項A\n\n## 第二節\n\n### 細項B\n";
        let outline = extract_headings(md);
        assert_eq!(outline.h1, vec!["標題"]);
        assert_eq!(outline.h2, vec!["第一節", "第二節"]);
        assert_eq!(outline.h3, vec!["細項A", "細項B"]);
    }

    #[test]
    fn sections_count_level_two_only() {
        let md = "# 標題\n## 第一節\n### 子節\n## 第二節\n";
        assert_eq!(count_sections(md), 2);
    }
}
