//! Gemini `generateContent` binding for keyword classification.
//!
//! One blocking HTTPS request per image. The image travels inline as base64,
//! followed by the prompt; the model is asked for a JSON body so the answer can
//! go straight through [`parse_keywords`].

use crate::classifier::{
    build_prompt, mime_type, parse_keywords, ClassifyError, ClassifyRequest, KeywordClassifier,
};
use crate::util::truncate_string;
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{Duration, Instant};
use ureq::Agent;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const ERROR_BODY_LIMIT: usize = 1024;

pub struct GeminiClassifier {
    agent: Agent,
    api_base: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    thinking_config: ThinkingConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: i64,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl GeminiClassifier {
    pub fn new(api_base: &str, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{model}:generateContent", self.api_base)
    }
}

impl KeywordClassifier for GeminiClassifier {
    fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Vec<String>, ClassifyError> {
        let bytes = fs::read(request.image).map_err(|source| ClassifyError::Image {
            path: request.image.display().to_string(),
            source,
        })?;
        let prompt = build_prompt(request.taxonomy);
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type(request.image),
                            data: general_purpose::STANDARD.encode(&bytes),
                        },
                    },
                    RequestPart::Text { text: &prompt },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                thinking_config: ThinkingConfig {
                    thinking_budget: request.thinking_budget,
                },
            },
        };

        let start = Instant::now();
        let mut response = self
            .agent
            .post(self.endpoint(request.model).as_str())
            .header("x-goog-api-key", request.credential)
            .send_json(&body)
            .map_err(|err| ClassifyError::Transport(err.to_string()))?;
        let status = response.status();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|err| ClassifyError::Transport(format!("read response body: {err}")))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis(),
            image_bytes = bytes.len(),
            prompt_bytes = prompt.len(),
            response_bytes = text.len(),
            status = status.as_u16(),
            "gemini request complete"
        );

        if !status.is_success() {
            return Err(ClassifyError::Api {
                status: status.as_u16(),
                body: truncate_string(text.trim(), ERROR_BODY_LIMIT),
            });
        }
        let answer = response_text(&text)?;
        parse_keywords(&answer)
    }
}

/// Concatenated non-thought text of the first candidate.
fn response_text(raw: &str) -> Result<String, ClassifyError> {
    let parsed: GenerateContentResponse = serde_json::from_str(raw)
        .map_err(|err| ClassifyError::Response(format!("response JSON failed to parse: {err}")))?;
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ClassifyError::Response("response has no candidates".to_string()))?;
    let finish_reason = candidate.finish_reason;
    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|part| !part.thought)
        .filter_map(|part| part.text)
        .collect();
    if text.trim().is_empty() {
        return Err(ClassifyError::Response(format!(
            "candidate has no text (finish reason: {})",
            finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}
