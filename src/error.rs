//! Error taxonomy for a single tagging run.
//!
//! Variants are listed in the order the pipeline can raise them; a run reports
//! exactly one of them and stops.

use crate::classifier::ClassifyError;
use crate::writer::MetadataWriteError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which of the three required inputs a path error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRole {
    ImageDir,
    RawSearchRoot,
    Taxonomy,
}

impl fmt::Display for PathRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PathRole::ImageDir => "image directory",
            PathRole::RawSearchRoot => "RAW search root",
            PathRole::Taxonomy => "taxonomy file",
        };
        f.write_str(label)
    }
}

/// A resolved RAW file whose sidecar is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSidecar {
    pub raw: PathBuf,
    pub expected: PathBuf,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("API key not provided; set GEMINI_API_KEY or pass --api-key")]
    CredentialMissing,

    #[error("{role} not found: {}", .path.display())]
    PathNotFound { role: PathRole, path: PathBuf },

    #[error("{role} is not a directory: {}", .path.display())]
    NotADirectory { role: PathRole, path: PathBuf },

    #[error("taxonomy {}: {reason}", .path.display())]
    Taxonomy { path: PathBuf, reason: String },

    #[error("no eligible images found in {}", .dir.display())]
    NoInput { dir: PathBuf },

    #[error("{}", resolution_message(.unresolved))]
    Resolution { unresolved: Vec<String> },

    #[error("{}", sidecar_message(.missing))]
    SidecarMissing { missing: Vec<MissingSidecar> },

    #[error("keyword generation failed for {image}: {source}")]
    Generation {
        image: String,
        #[source]
        source: ClassifyError,
    },

    #[error("writing keywords failed: {source}")]
    Write {
        #[source]
        source: MetadataWriteError,
    },

    #[error("read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn resolution_message(unresolved: &[String]) -> String {
    let mut message = format!("no RAW file found for {} image(s):", unresolved.len());
    for name in unresolved {
        message.push_str("\n  - ");
        message.push_str(name);
    }
    message
}

fn sidecar_message(missing: &[MissingSidecar]) -> String {
    let mut message = format!("{} RAW file(s) missing XMP sidecars:", missing.len());
    for entry in missing {
        message.push_str(&format!(
            "\n  - {}\n    expected: {}",
            entry.raw.display(),
            entry.expected.display()
        ));
    }
    message
}
