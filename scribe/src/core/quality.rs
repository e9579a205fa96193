use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::config::QualityConfig;
use crate::core::metrics;
use crate::core::participants::{self, ParticipantInfo};

/// Named pass/fail results for one draft. Surfaced verbatim to the caller;
/// the generator's retry predicate only looks at the hard subset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QualityReport(BTreeMap<String, bool>);

impl QualityReport {
    pub fn all_passed(&self) -> bool {
        self.0.values().all(|v| *v)
    }

    /// Checks missing from the report (disabled ones) count as passed.
    pub fn passed(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, passed)| (name.as_str(), *passed))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, name: &str, passed: bool) {
        self.0.insert(name.to_string(), passed);
    }
}

pub struct CheckContext<'a> {
    pub article: &'a str,
    pub expected_paragraphs: usize,
    pub participants: &'a [ParticipantInfo],
    pub config: &'a QualityConfig,
}

type Predicate = fn(&CheckContext<'_>) -> bool;

/// The fixed predicate table. Each entry is independent and pure; the
/// `disabled` list in QualityConfig removes entries per deployment.
const CHECKS: &[(&str, Predicate)] = &[
    ("has_title", has_title),
    ("has_quotes", has_quotes),
    ("paragraph_count_ok", paragraph_count_ok),
    ("word_count_ok", word_count_ok),
    ("mentions_primary", mentions_primary),
    ("no_filler_words", no_filler_words),
];

/// Checks that gate the repair loop. Strict subset of the table above.
pub const HARD_CHECKS: &[&str] = &["word_count_ok", "has_quotes"];

fn has_title(ctx: &CheckContext<'_>) -> bool {
    ctx.article.starts_with("# ")
}

fn has_quotes(ctx: &CheckContext<'_>) -> bool {
    metrics::count_quote_pairs(ctx.article) >= ctx.config.min_quotes
}

/// Sections are counted by `## ` markers, not blank-line paragraphs.
fn paragraph_count_ok(ctx: &CheckContext<'_>) -> bool {
    let sections = metrics::count_sections(ctx.article);
    sections.abs_diff(ctx.expected_paragraphs) <= ctx.config.paragraph_tolerance
}

fn word_count_ok(ctx: &CheckContext<'_>) -> bool {
    let count = metrics::count_chars(ctx.article);
    let (min, max) = ctx.config.word_range;
    (min..=max).contains(&count)
}

/// Vacuously true when no primary participant was supplied.
fn mentions_primary(ctx: &CheckContext<'_>) -> bool {
    let names = participants::primary_names(ctx.participants);
    names.is_empty() || names.iter().any(|name| ctx.article.contains(name))
}

fn no_filler_words(ctx: &CheckContext<'_>) -> bool {
    !ctx.config
        .filler_phrases
        .iter()
        .any(|phrase| ctx.article.contains(phrase.as_str()))
}

pub fn run_checks(
    article: &str,
    expected_paragraphs: usize,
    participants: &[ParticipantInfo],
    config: &QualityConfig,
) -> QualityReport {
    let ctx = CheckContext {
        article,
        expected_paragraphs,
        participants,
        config,
    };
    let mut report = QualityReport::default();
    for (name, predicate) in CHECKS {
        if config.disabled.iter().any(|d| d == name) {
            continue;
        }
        report.insert(name, predicate(&ctx));
    }
    report
}

pub fn hard_checks_passed(report: &QualityReport) -> bool {
    HARD_CHECKS.iter().all(|name| report.passed(name))
}
