use serde::Serialize;

/// Fullwidth slash separating the three fields of one participant line.
pub const FIELD_DELIMITER: char = '／';

pub const NO_PARTICIPANTS_PLACEHOLDER: &str = "（未提供受訪者資料）";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantWeight {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantInfo {
    pub name: String,
    pub title: String,
    pub weight: ParticipantWeight,
}

/// Parse the line-oriented `姓名／職稱／權重` format. Blank lines and lines
/// that do not split into exactly three fields with weight 1 or 2 are
/// skipped; order is preserved.
pub fn parse_participants(raw: &str) -> Vec<ParticipantInfo> {
    let mut info = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(FIELD_DELIMITER).map(str::trim).collect();
        if parts.len() != 3 {
            continue;
        }
        let weight = match parts[2] {
            "1" => ParticipantWeight::Primary,
            "2" => ParticipantWeight::Secondary,
            _ => continue,
        };
        info.push(ParticipantInfo {
            name: parts[0].to_string(),
            title: parts[1].to_string(),
            weight,
        });
    }
    info
}

/// Bullet-list description used inside generation prompts.
pub fn format_participants(info: &[ParticipantInfo]) -> String {
    if info.is_empty() {
        return NO_PARTICIPANTS_PLACEHOLDER.to_string();
    }
    info.iter()
        .map(|p| {
            let role = match p.weight {
                ParticipantWeight::Primary => "主軸人物",
                ParticipantWeight::Secondary => "輔助人物",
            };
            format!("- {}（{}）- {}", p.name, p.title, role)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn primary_names(info: &[ParticipantInfo]) -> Vec<&str> {
    info.iter()
        .filter(|p| p.weight == ParticipantWeight::Primary)
        .map(|p| p.name.as_str())
        .collect()
}
