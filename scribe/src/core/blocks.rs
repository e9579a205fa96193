use serde::{Deserialize, Serialize};

/// Marker introducing one block; a titled section of a finished article.
pub const BLOCK_HEADING_PREFIX: &str = "### ";

/// Label substituted for an empty title when joining.
pub const UNTITLED_BLOCK_LABEL: &str = "未命名段落";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockRole {
    Opening,
    Body,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub role: BlockRole,
    pub title: String,
    pub content: String,
}

/// Decompose a document at its `### ` headings. Text before the first
/// heading is discarded when headings exist; a document with no heading at
/// all becomes a single opening block. A single block is Opening, never
/// Closing; otherwise the first block is Opening, the last Closing and the
/// rest Body.
pub fn split_article(document: &str) -> Vec<Block> {
    let mut raw: Vec<(String, Vec<&str>)> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in document.lines() {
        if let Some(title) = line.trim_end().strip_prefix(BLOCK_HEADING_PREFIX) {
            if let Some(block) = current.take() {
                raw.push(block);
            }
            current = Some((title.trim().to_string(), Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some(block) = current.take() {
        raw.push(block);
    }

    if raw.is_empty() {
        return vec![Block {
            role: BlockRole::Opening,
            title: UNTITLED_BLOCK_LABEL.to_string(),
            content: document.trim().to_string(),
        }];
    }

    let count = raw.len();
    raw.into_iter()
        .enumerate()
        .map(|(idx, (title, lines))| {
            let role = if idx == 0 {
                BlockRole::Opening
            } else if idx == count - 1 {
                BlockRole::Closing
            } else {
                BlockRole::Body
            };
            Block {
                role,
                title,
                content: lines.join("\n").trim().to_string(),
            }
        })
        .collect()
}

/// Reassemble blocks into a document: `### 標題`, a blank line, the
/// content, with one blank line between blocks. Empty titles are replaced
/// by the placeholder label so the result survives a round trip.
pub fn join_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| {
            let title = block.title.trim();
            let title = if title.is_empty() {
                UNTITLED_BLOCK_LABEL
            } else {
                title
            };
            format!("{}{}\n\n{}", BLOCK_HEADING_PREFIX, title, block.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
