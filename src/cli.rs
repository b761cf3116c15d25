//! CLI argument parsing for a tagging run.
//!
//! Options left unset here fall back to the environment, then the config file,
//! then built-in defaults (see `config.rs`).

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "photo-keyword-tagger",
    version,
    about = "Add AI-selected taxonomy keywords to the XMP sidecars of RAW originals",
    after_help = "Arguments:\n  IMAGE_DIR        Directory of exported JPEGs to classify\n  RAW_SEARCH_ROOT  Directory searched recursively for the RAW originals\n  TAXONOMY         Lightroom keyword export (txt)\n\nExamples:\n  photo-keyword-tagger ~/Exports /Volumes/T7/Pictures ~/taxonomy.txt\n  photo-keyword-tagger ~/Exports ~/Pictures ~/taxonomy.txt --extension .NEF --json",
    arg_required_else_help = true
)]
pub struct Args {
    /// Directory containing exported JPEG files
    #[arg(value_name = "IMAGE_DIR")]
    pub image_dir: PathBuf,

    /// Base directory searched recursively for RAW originals
    #[arg(value_name = "RAW_SEARCH_ROOT")]
    pub raw_search_root: PathBuf,

    /// Lightroom keyword taxonomy file
    #[arg(value_name = "TAXONOMY")]
    pub taxonomy: PathBuf,

    /// Gemini API key (falls back to GEMINI_API_KEY)
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Gemini model used for keyword selection
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Thinking budget passed to the model
    #[arg(long, value_name = "TOKENS", allow_negative_numbers = true)]
    pub thinking_budget: Option<i64>,

    /// exiftool binary, optionally with leading arguments
    #[arg(long, value_name = "CMD")]
    pub exiftool_path: Option<String>,

    /// RAW suffix to search for, in priority order (repeatable)
    #[arg(long = "extension", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// JSON config file (default: <config dir>/photo-keyword-tagger/config.json)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the keyword map as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Emit a verbose transcript of the run
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn repeatable_extensions_keep_order() {
        let args = Args::try_parse_from([
            "photo-keyword-tagger",
            "exports",
            "raws",
            "taxonomy.txt",
            "--extension",
            ".NEF",
            "--extension",
            "cr3",
            "--thinking-budget",
            "-1",
        ])
        .expect("parse args");
        assert_eq!(args.extensions, vec![".NEF", "cr3"]);
        assert_eq!(args.thinking_budget, Some(-1));
        assert!(args.api_key.is_none());
        assert!(!args.json);
    }
}
