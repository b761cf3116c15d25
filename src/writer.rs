//! Batch keyword writes into XMP sidecars via exiftool.
//!
//! A batch is all-or-nothing: every sidecar is checked and backed up before the
//! first exiftool call, and any failure restores the sidecars already touched.

use crate::sidecar::sidecar_path;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use thiserror::Error;

pub const DEFAULT_EXIFTOOL: &str = "exiftool";

const KEYWORD_TAG: &str = "-XMP-dc:Subject+=";

pub trait MetadataWriter {
    /// Append keywords to the sidecar of every RAW file in `batch`.
    fn write_batch(&self, batch: &BTreeMap<PathBuf, Vec<String>>) -> Result<(), MetadataWriteError>;
}

#[derive(Debug, Error)]
pub enum MetadataWriteError {
    #[error("invalid exiftool command {command:?}: {reason}")]
    Command { command: String, reason: String },

    #[error("sidecar missing for {}: expected {}", .raw.display(), .sidecar.display())]
    SidecarMissing { raw: PathBuf, sidecar: PathBuf },

    #[error("back up {}: {source}", .path.display())]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("exiftool failed on {}: {detail}", .sidecar.display())]
    Tool { sidecar: PathBuf, detail: String },

    #[error("{cause}; restoring sidecars also failed: {}", .failures.join("; "))]
    Restore {
        cause: Box<MetadataWriteError>,
        failures: Vec<String>,
    },
}

/// Writes keywords with an external exiftool process, one call per sidecar.
#[derive(Debug, Clone)]
pub struct ExiftoolWriter {
    command: String,
}

struct Backup {
    sidecar: PathBuf,
    copy: PathBuf,
}

impl ExiftoolWriter {
    /// `command` may carry leading arguments (`perl /opt/exiftool/exiftool`).
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }

    fn resolve_argv(&self) -> Result<Vec<String>, MetadataWriteError> {
        let invalid = |reason: String| MetadataWriteError::Command {
            command: self.command.clone(),
            reason,
        };
        let mut argv = shell_words::split(&self.command).map_err(|err| invalid(err.to_string()))?;
        if argv.is_empty() {
            return Err(invalid("command is empty".to_string()));
        }
        let program = which::which(&argv[0]).map_err(|err| invalid(err.to_string()))?;
        argv[0] = program.display().to_string();
        Ok(argv)
    }

    fn append_keywords(
        &self,
        argv: &[String],
        sidecar: &Path,
        keywords: &[String],
    ) -> Result<(), MetadataWriteError> {
        let start = Instant::now();
        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .arg("-overwrite_original")
            .args(keywords.iter().map(|keyword| format!("{KEYWORD_TAG}{keyword}")))
            .arg(sidecar)
            .output()
            .map_err(|err| MetadataWriteError::Tool {
                sidecar: sidecar.to_path_buf(),
                detail: format!("spawn {}: {err}", argv[0]),
            })?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis(),
            keywords = keywords.len(),
            sidecar = %sidecar.display(),
            "exiftool write complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let line = stderr.trim().lines().next().unwrap_or_default();
            let detail = if line.is_empty() {
                format!("status {}", output.status)
            } else {
                line.to_string()
            };
            return Err(MetadataWriteError::Tool {
                sidecar: sidecar.to_path_buf(),
                detail,
            });
        }
        Ok(())
    }
}

impl MetadataWriter for ExiftoolWriter {
    fn write_batch(
        &self,
        batch: &BTreeMap<PathBuf, Vec<String>>,
    ) -> Result<(), MetadataWriteError> {
        let pending: Vec<(PathBuf, &[String])> = batch
            .iter()
            .filter(|(_, keywords)| !keywords.is_empty())
            .map(|(raw, keywords)| (sidecar_path(raw), keywords.as_slice()))
            .collect();
        for (raw, _) in batch {
            let sidecar = sidecar_path(raw);
            if !sidecar.is_file() {
                return Err(MetadataWriteError::SidecarMissing {
                    raw: raw.clone(),
                    sidecar,
                });
            }
        }
        if pending.is_empty() {
            return Ok(());
        }
        let argv = self.resolve_argv()?;

        let backup_root = tempfile::Builder::new()
            .prefix("photo-keyword-tagger-")
            .tempdir()
            .map_err(|source| MetadataWriteError::Backup {
                path: std::env::temp_dir(),
                source,
            })?;
        let mut backups = Vec::with_capacity(pending.len());
        for (idx, (sidecar, _)) in pending.iter().enumerate() {
            let copy = backup_root.path().join(format!("{idx}.xmp"));
            fs::copy(sidecar, &copy).map_err(|source| MetadataWriteError::Backup {
                path: sidecar.clone(),
                source,
            })?;
            backups.push(Backup {
                sidecar: sidecar.clone(),
                copy,
            });
        }

        for (idx, (sidecar, keywords)) in pending.iter().enumerate() {
            if let Err(err) = self.append_keywords(&argv, sidecar, keywords) {
                // Restore the failed sidecar too; exiftool may have left it half-written.
                let failures = restore(&backups[..=idx]);
                if failures.is_empty() {
                    tracing::warn!(restored = idx + 1, "batch write failed; sidecars restored");
                    return Err(err);
                }
                return Err(MetadataWriteError::Restore {
                    cause: Box::new(err),
                    failures,
                });
            }
        }
        Ok(())
    }
}

fn restore(backups: &[Backup]) -> Vec<String> {
    let mut failures = Vec::new();
    for backup in backups {
        if let Err(err) = fs::copy(&backup.copy, &backup.sidecar) {
            tracing::error!(sidecar = %backup.sidecar.display(), error = %err, "restore failed");
            failures.push(format!("{}: {err}", backup.sidecar.display()));
        }
    }
    failures
}
