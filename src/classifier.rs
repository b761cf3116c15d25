//! Keyword classification seam and response parsing.
//!
//! The pipeline only sees [`KeywordClassifier`]; the Gemini binding lives in
//! `gemini.rs`. Parsing helpers here are shared so any model that answers with
//! `{"keywords": [...]}` can reuse them.

use crate::taxonomy::Taxonomy;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const PROMPT_TEMPLATE: &str = include_str!("../prompts/keyword_prompt.md");

/// Everything a classifier needs for one image.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyRequest<'a> {
    pub image: &'a Path,
    pub taxonomy: &'a Taxonomy,
    pub model: &'a str,
    pub thinking_budget: i64,
    pub credential: &'a str,
}

pub trait KeywordClassifier {
    /// Keywords for one image, in the order the model returned them.
    fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Vec<String>, ClassifyError>;
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("read image {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unusable model response: {0}")]
    Response(String),
}

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    #[serde(default)]
    keywords: Vec<String>,
}

/// Prompt text with the taxonomy substituted in.
pub fn build_prompt(taxonomy: &Taxonomy) -> String {
    PROMPT_TEMPLATE.replace("{taxonomy}", taxonomy.text().trim_end())
}

/// MIME type for an image path; unknown suffixes fall back to JPEG.
pub fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "image/jpeg",
    }
}

/// Parse a `{"keywords": [...]}` answer, tolerating code fences and leading prose.
pub fn parse_keywords(text: &str) -> Result<Vec<String>, ClassifyError> {
    let json = extract_json(text);
    let parsed: KeywordResponse = serde_json::from_str(json).map_err(|err| {
        ClassifyError::Response(format!(
            "{err}; response was: {}",
            crate::util::truncate_string(text.trim(), 512)
        ))
    })?;
    Ok(parsed
        .keywords
        .into_iter()
        .map(|keyword| keyword.trim().to_string())
        .filter(|keyword| !keyword.is_empty())
        .collect())
}

fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest,
        };
        let body = body.trim_end();
        return body.strip_suffix("```").unwrap_or(body).trim();
    }
    if trimmed.starts_with('{') {
        return trimmed;
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}
