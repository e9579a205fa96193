use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const TEMPLATE_FILE: &str = "article_template.txt";
pub const STYLE_OPTIONS_FILE: &str = "style_options.json";

/// Style label → backing file. Listing available styles means listing
/// which of these currently exist on disk.
const STYLE_FILES: &[(&str, &str)] = &[
    ("企業", "style_corporate.md"),
    ("學校", "style_school.md"),
    ("政府", "style_government.md"),
];

pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn template_candidates(&self) -> Vec<PathBuf> {
        vec![
            self.root.join("templates").join(TEMPLATE_FILE),
            self.root.join(TEMPLATE_FILE),
        ]
    }

    /// A missing template is a hard error listing every attempted path.
    /// There is no built-in fallback text.
    pub fn load_article_template(&self) -> Result<String> {
        let candidates = self.template_candidates();
        for path in &candidates {
            if path.exists() {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("模板讀取失敗：{}", path.display()))?;
                return Ok(text.trim().to_string());
            }
        }
        let attempted = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("、");
        bail!("模板載入失敗：找不到 {}（已嘗試：{}）", TEMPLATE_FILE, attempted)
    }

    pub fn list_styles(&self) -> Vec<&'static str> {
        STYLE_FILES
            .iter()
            .filter(|(_, file)| self.root.join("styles").join(file).exists())
            .map(|(label, _)| *label)
            .collect()
    }

    pub fn load_style(&self, label: &str) -> Result<String> {
        let (_, file) = STYLE_FILES
            .iter()
            .find(|(known, _)| *known == label)
            .ok_or_else(|| {
                anyhow!(
                    "風格「{}」不存在。可用風格：{}",
                    label,
                    self.list_styles().join("、")
                )
            })?;
        let path = self.root.join("styles").join(file);
        if !path.exists() {
            bail!("風格檔案不存在：{}", path.display());
        }
        fs::read_to_string(&path).with_context(|| format!("風格讀取失敗：{}", path.display()))
    }

    pub fn has_style_options(&self) -> bool {
        self.root.join(STYLE_OPTIONS_FILE).exists()
    }

    pub fn load_style_options(&self) -> Result<StyleOptions> {
        let path = self.root.join(STYLE_OPTIONS_FILE);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("開場風格設定讀取失敗：{}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("開場風格設定解析失敗：{}", path.display()))
    }
}

/// Structured per-opening-style requirements plus the global forbidden
/// phrase list and quality checklist.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StyleOptions {
    #[serde(default)]
    pub styles: BTreeMap<String, OpeningStyleSpec>,
    #[serde(default)]
    pub forbidden_phrases: Vec<String>,
    #[serde(default)]
    pub quality_checklist: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpeningStyleSpec {
    #[serde(default)]
    pub required_context: Vec<String>,
    #[serde(default)]
    pub instructions: String,
}

impl StyleOptions {
    pub fn instructions_for(&self, opening_style: &str) -> Option<&str> {
        self.styles
            .get(opening_style)
            .map(|spec| spec.instructions.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Validate that every context field the opening style declares as
    /// required was supplied non-empty. Unknown styles impose nothing.
    pub fn validate_context(
        &self,
        opening_style: &str,
        fields: &BTreeMap<&str, &str>,
    ) -> Result<()> {
        let Some(spec) = self.styles.get(opening_style) else {
            return Ok(());
        };
        let missing: Vec<&str> = spec
            .required_context
            .iter()
            .filter(|field| {
                fields
                    .get(field.as_str())
                    .map_or(true, |value| value.trim().is_empty())
            })
            .map(|s| s.as_str())
            .collect();
        if !missing.is_empty() {
            bail!(
                "開場風格「{}」缺少必要欄位：{}",
                opening_style,
                missing.join("、")
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, TemplateStore) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let store = TemplateStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn loads_template_from_first_candidate() {
        let (_dir, store) = store_with(&[("templates/article_template.txt", "模板內容\n")]);
        assert_eq!(store.load_article_template().unwrap(), "模板內容");
    }

    #[test]
    fn missing_template_lists_attempted_paths() {
        let (_dir, store) = store_with(&[]);
        let err = store.load_article_template().unwrap_err().to_string();
        assert!(err.contains("模板載入失敗"));
        assert!(err.contains("templates"));
        assert!(err.contains(TEMPLATE_FILE));
    }

    #[test]
    fn lists_only_existing_styles() {
        let (_dir, store) = store_with(&[
            ("styles/style_corporate.md", "企業風格"),
            ("styles/style_government.md", "政府風格"),
        ]);
        assert_eq!(store.list_styles(), vec!["企業", "政府"]);
        assert_eq!(store.load_style("企業").unwrap(), "企業風格");
    }

    #[test]
    fn unknown_style_label_is_an_error() {
        let (_dir, store) = store_with(&[("styles/style_corporate.md", "企業風格")]);
        let err = store.load_style("部落格").unwrap_err().to_string();
        assert!(err.contains("風格「部落格」不存在"));
        assert!(err.contains("企業"));
    }

    #[test]
    fn known_style_with_missing_file_is_an_error() {
        let (_dir, store) = store_with(&[]);
        let err = store.load_style("學校").unwrap_err().to_string();
        assert!(err.contains("風格檔案不存在"));
    }

    #[test]
    fn style_options_roundtrip_and_validation() {
        let json = r#"{
            "styles": {
                "數據開場": {
                    "required_context": ["opening_context", "summary_points"],
                    "instructions": "以具體數據切入主題。"
                },
                "直述主題": { "required_context": [] }
            },
            "forbidden_phrases": ["劃時代"],
            "quality_checklist": ["開場需呼應主題"]
        }"#;
        let (_dir, store) = store_with(&[(STYLE_OPTIONS_FILE, json)]);
        assert!(store.has_style_options());
        let options = store.load_style_options().unwrap();

        assert_eq!(options.forbidden_phrases, vec!["劃時代"]);
        assert_eq!(options.instructions_for("數據開場"), Some("以具體數據切入主題。"));

        let mut fields = BTreeMap::new();
        fields.insert("opening_context", "");
        fields.insert("summary_points", "市佔率 32%");
        let err = options
            .validate_context("數據開場", &fields)
            .unwrap_err()
            .to_string();
        assert!(err.contains("數據開場"));
        assert!(err.contains("opening_context"));
        assert!(!err.contains("summary_points"));

        fields.insert("opening_context", "強調成長數字");
        assert!(options.validate_context("數據開場", &fields).is_ok());
        assert!(options.validate_context("沒有定義的風格", &fields).is_ok());
    }
}
