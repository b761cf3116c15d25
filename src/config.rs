//! Run configuration and its layered sources.
//!
//! Precedence is CLI flag, then environment, then the JSON config file, then
//! built-in defaults. The credential is resolved here and nowhere else, so the
//! pipeline only ever sees an explicit `Option<String>`.

use crate::cli::Args;
use crate::gemini::DEFAULT_API_BASE;
use crate::util::normalize_extension;
use crate::writer::DEFAULT_EXIFTOOL;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const API_BASE_ENV: &str = "PHOTO_TAGGER_API_BASE";

pub const DEFAULT_MODEL: &str = "gemini-flash-lite-latest";
pub const DEFAULT_THINKING_BUDGET: i64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RAW_EXTENSIONS: [&str; 4] = [".arw", ".dng", ".ARW", ".DNG"];
pub const DEFAULT_IMAGE_EXTENSIONS: [&str; 2] = [".jpg", ".jpeg"];

const CONFIG_DIR_NAME: &str = "photo-keyword-tagger";
const CONFIG_FILE_NAME: &str = "config.json";

/// Options the pipeline consumes for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub model: String,
    pub thinking_budget: i64,
    pub exiftool_path: String,
    /// Tried in order; matched exactly.
    pub raw_extensions: Vec<String>,
    /// Matched ignoring case.
    pub image_extensions: Vec<String>,
    pub credential: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
            exiftool_path: DEFAULT_EXIFTOOL.to_string(),
            raw_extensions: DEFAULT_RAW_EXTENSIONS.map(String::from).to_vec(),
            image_extensions: DEFAULT_IMAGE_EXTENSIONS.map(String::from).to_vec(),
            credential: None,
        }
    }
}

/// Everything the binary needs: the run config plus classifier transport settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub run: RunConfig,
    pub api_base: String,
    pub request_timeout: Duration,
}

/// Optional on-disk overrides, `config.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub thinking_budget: Option<i64>,
    #[serde(default)]
    pub exiftool_path: Option<String>,
    #[serde(default)]
    pub raw_extensions: Option<Vec<String>>,
    #[serde(default)]
    pub image_extensions: Option<Vec<String>>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load the config file. An explicit path must exist; the default path is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.is_file() => path,
            _ => return Ok(FileConfig::default()),
        },
    };
    let bytes = fs::read(&path).with_context(|| format!("read config {}", path.display()))?;
    let config: FileConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Merge CLI args, environment lookups, and the config file into settings.
pub fn resolve_settings<F>(args: &Args, file: FileConfig, env: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = RunConfig::default();
    let raw_extensions = extension_list(&args.extensions)
        .or_else(|| file.raw_extensions.as_deref().and_then(extension_list))
        .unwrap_or(defaults.raw_extensions);
    let image_extensions = file
        .image_extensions
        .as_deref()
        .and_then(extension_list)
        .unwrap_or(defaults.image_extensions);
    let timeout_secs = file
        .request_timeout_secs
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

    let credential = non_blank(args.api_key.clone())
        .or_else(|| non_blank(env(API_KEY_ENV)))
        .or_else(|| non_blank(file.api_key));
    let api_base = non_blank(env(API_BASE_ENV))
        .or_else(|| non_blank(file.api_base))
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

    let run = RunConfig {
        model: non_blank(args.model.clone())
            .or_else(|| non_blank(file.model))
            .unwrap_or(defaults.model),
        thinking_budget: args
            .thinking_budget
            .or(file.thinking_budget)
            .unwrap_or(defaults.thinking_budget),
        exiftool_path: non_blank(args.exiftool_path.clone())
            .or_else(|| non_blank(file.exiftool_path))
            .unwrap_or(defaults.exiftool_path),
        raw_extensions,
        image_extensions,
        credential,
    };
    Settings {
        run,
        api_base,
        request_timeout: Duration::from_secs(timeout_secs),
    }
}

/// Normalized suffixes, or `None` when every entry is blank.
fn extension_list(values: &[String]) -> Option<Vec<String>> {
    let list: Vec<String> = values
        .iter()
        .filter(|value| !value.trim().is_empty())
        .map(|value| normalize_extension(value))
        .collect();
    (!list.is_empty()).then_some(list)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
