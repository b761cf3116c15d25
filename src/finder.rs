//! RAW original lookup by stem.
//!
//! Suffixes are tried in the order given. When several files share the same
//! stem and suffix (backup copies, duplicate imports), the lexicographically
//! smallest path wins so repeated runs resolve identically.

use crate::util::normalize_extension;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub trait RawFinder {
    /// First RAW file named `stem + suffix` under `root`, or `None`.
    fn find(&self, stem: &str, root: &Path, suffixes: &[String]) -> Option<PathBuf>;
}

/// Recursive filesystem search rooted at the RAW library.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkdirRawFinder;

impl RawFinder for WalkdirRawFinder {
    fn find(&self, stem: &str, root: &Path, suffixes: &[String]) -> Option<PathBuf> {
        if suffixes.is_empty() {
            return None;
        }
        let wanted: Vec<OsString> = suffixes
            .iter()
            .map(|suffix| OsString::from(format!("{stem}{}", normalize_extension(suffix))))
            .collect();
        let mut best: Vec<Option<PathBuf>> = vec![None; wanted.len()];

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name();
            for (idx, candidate) in wanted.iter().enumerate() {
                if name != candidate.as_os_str() {
                    continue;
                }
                let path = entry.path();
                let replace = match &best[idx] {
                    Some(current) => path < current.as_path(),
                    None => true,
                };
                if replace {
                    best[idx] = Some(path.to_path_buf());
                }
            }
        }

        best.into_iter().flatten().next()
    }
}
