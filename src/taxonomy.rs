//! Keyword taxonomy loading and membership checks.
//!
//! The taxonomy is a Lightroom keyword export: one keyword per line, nesting
//! expressed with leading tabs, `[Category]` for non-exported parents and
//! `{Synonym}` for synonyms. The full text goes to the model unchanged; the
//! parsed keyword list is what classifier output is checked against.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Taxonomy {
    text: String,
    keywords: Vec<String>,
    by_lowercase: BTreeMap<String, usize>,
}

/// Result of checking classifier output against the taxonomy.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
}

impl Taxonomy {
    /// Read and parse a taxonomy file; errors are plain reasons for the caller to wrap.
    pub fn load(path: &Path) -> Result<Self, String> {
        let bytes = fs::read(path).map_err(|err| format!("read failed: {err}"))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let taxonomy = Self::parse(text);
        if taxonomy.keywords.is_empty() {
            return Err("contains no keywords".to_string());
        }
        Ok(taxonomy)
    }

    pub fn parse(text: String) -> Self {
        let mut keywords = Vec::new();
        let mut seen = BTreeSet::new();
        for line in text.lines() {
            let Some(keyword) = parse_line(line) else {
                continue;
            };
            if seen.insert(keyword.clone()) {
                keywords.push(keyword);
            }
        }
        let mut by_lowercase = BTreeMap::new();
        for (idx, keyword) in keywords.iter().enumerate() {
            by_lowercase.entry(keyword.to_lowercase()).or_insert(idx);
        }
        Self {
            text,
            keywords,
            by_lowercase,
        }
    }

    /// Raw file contents, as sent to the classifier.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Canonical spelling of `candidate`: exact match first, then case-insensitive.
    pub fn canonical(&self, candidate: &str) -> Option<&str> {
        let trimmed = candidate.trim();
        if let Some(found) = self.keywords.iter().find(|keyword| *keyword == trimmed) {
            return Some(found.as_str());
        }
        self.by_lowercase
            .get(&trimmed.to_lowercase())
            .map(|idx| self.keywords[*idx].as_str())
    }

    /// Split classifier output into members and non-members, preserving order.
    pub fn filter(&self, candidates: Vec<String>) -> KeywordFilter {
        let mut filter = KeywordFilter::default();
        for candidate in candidates {
            match self.canonical(&candidate) {
                Some(keyword) => filter.accepted.push(keyword.to_string()),
                None => filter.rejected.push(candidate),
            }
        }
        filter
    }
}

fn parse_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let unwrapped = strip_wrapping(trimmed, '[', ']')
        .or_else(|| strip_wrapping(trimmed, '{', '}'))
        .unwrap_or(trimmed)
        .trim();
    if unwrapped.is_empty() {
        return None;
    }
    Some(unwrapped.to_string())
}

fn strip_wrapping(text: &str, open: char, close: char) -> Option<&str> {
    text.strip_prefix(open)?.strip_suffix(close)
}
