//! Batch orchestration: discover, resolve, gate, classify, write.
//!
//! Each phase runs to completion before the next starts, and the first failing
//! phase ends the run. Nothing is written unless every image resolved to a RAW
//! file with a sidecar and every classifier call succeeded; the single batch
//! write is the only mutation.
//!
//! Collaborators are injected as trait objects so the orchestrator itself
//! touches the filesystem only to check its inputs, list the image directory,
//! and read the taxonomy.

use crate::classifier::{ClassifyRequest, KeywordClassifier};
use crate::config::RunConfig;
use crate::discovery::{discover_images, SourceImage};
use crate::error::{MissingSidecar, PathRole, PipelineError};
use crate::finder::RawFinder;
use crate::progress::Progress;
use crate::sidecar::SidecarChecker;
use crate::taxonomy::Taxonomy;
use crate::writer::MetadataWriter;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// The three required inputs of a run.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub image_dir: PathBuf,
    pub raw_search_root: PathBuf,
    pub taxonomy_path: PathBuf,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Exactly what was handed to the writer.
    pub keywords: BTreeMap<PathBuf, Vec<String>>,
    /// Classifier output dropped because it is not in the taxonomy.
    pub rejected: BTreeMap<PathBuf, Vec<String>>,
}

pub struct Pipeline<'a> {
    finder: &'a dyn RawFinder,
    sidecars: &'a dyn SidecarChecker,
    classifier: &'a dyn KeywordClassifier,
    writer: &'a dyn MetadataWriter,
    progress: Progress,
}

struct Resolved {
    image: SourceImage,
    raw: PathBuf,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        finder: &'a dyn RawFinder,
        sidecars: &'a dyn SidecarChecker,
        classifier: &'a dyn KeywordClassifier,
        writer: &'a dyn MetadataWriter,
    ) -> Self {
        Self {
            finder,
            sidecars,
            classifier,
            writer,
            progress: Progress::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(&self, inputs: &RunInputs, config: &RunConfig) -> Result<RunResult, PipelineError> {
        let start = Instant::now();
        let credential = config
            .credential
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(PipelineError::CredentialMissing)?;
        check_inputs(inputs)?;
        let taxonomy = match Taxonomy::load(&inputs.taxonomy_path) {
            Ok(taxonomy) => taxonomy,
            Err(reason) => {
                let path = inputs.taxonomy_path.clone();
                return Err(PipelineError::Taxonomy { path, reason });
            }
        };
        tracing::info!(
            keywords = taxonomy.keywords().len(),
            path = %inputs.taxonomy_path.display(),
            "taxonomy loaded"
        );

        let images = self.discover(inputs, config)?;
        let resolved = self.resolve(images, inputs, config)?;
        self.check_sidecars(&resolved)?;
        let result = self.generate(&resolved, &taxonomy, config, credential)?;
        self.writer
            .write_batch(&result.keywords)
            .map_err(|source| PipelineError::Write { source })?;

        tracing::info!(
            files = result.keywords.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "run complete"
        );
        Ok(result)
    }

    fn discover(
        &self,
        inputs: &RunInputs,
        config: &RunConfig,
    ) -> Result<Vec<SourceImage>, PipelineError> {
        let dir = &inputs.image_dir;
        let images = match discover_images(dir, &config.image_extensions) {
            Ok(images) => images,
            Err(source) => {
                let path = dir.clone();
                return Err(PipelineError::Io { path, source });
            }
        };
        if images.is_empty() {
            return Err(PipelineError::NoInput { dir: dir.clone() });
        }
        tracing::info!(
            count = images.len(),
            dir = %dir.display(),
            "images discovered"
        );
        Ok(images)
    }

    fn resolve(
        &self,
        images: Vec<SourceImage>,
        inputs: &RunInputs,
        config: &RunConfig,
    ) -> Result<Vec<Resolved>, PipelineError> {
        let root = &inputs.raw_search_root;
        let suffixes = &config.raw_extensions;
        let bar = self.progress.bar(images.len(), "Locating RAW files");
        let mut resolved = Vec::with_capacity(images.len());
        let mut unresolved = Vec::new();
        for image in images {
            bar.set_message(image.name());
            match self.finder.find(&image.stem, root, suffixes) {
                Some(raw) => {
                    tracing::debug!(
                        image = %image.path.display(),
                        raw = %raw.display(),
                        "resolved"
                    );
                    resolved.push(Resolved { image, raw });
                }
                None => unresolved.push(image.name()),
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        if !unresolved.is_empty() {
            return Err(PipelineError::Resolution { unresolved });
        }
        Ok(resolved)
    }

    fn check_sidecars(&self, resolved: &[Resolved]) -> Result<(), PipelineError> {
        let missing: Vec<MissingSidecar> = resolved
            .iter()
            .filter(|entry| !self.sidecars.exists(&entry.raw))
            .map(|entry| MissingSidecar {
                raw: entry.raw.clone(),
                expected: self.sidecars.sidecar_path(&entry.raw),
            })
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::SidecarMissing { missing });
        }
        tracing::info!(count = resolved.len(), "sidecars verified");
        Ok(())
    }

    fn generate(
        &self,
        resolved: &[Resolved],
        taxonomy: &Taxonomy,
        config: &RunConfig,
        credential: &str,
    ) -> Result<RunResult, PipelineError> {
        let bar = self.progress.bar(resolved.len(), "Generating keywords");
        let mut result = RunResult::default();
        for entry in resolved {
            bar.set_message(entry.image.name());
            let request = ClassifyRequest {
                image: &entry.image.path,
                taxonomy,
                model: &config.model,
                thinking_budget: config.thinking_budget,
                credential,
            };
            let keywords = match self.classifier.classify(&request) {
                Ok(keywords) => keywords,
                Err(source) => {
                    bar.abandon();
                    return Err(PipelineError::Generation {
                        image: entry.image.name(),
                        source,
                    });
                }
            };
            let filtered = taxonomy.filter(keywords);
            if !filtered.rejected.is_empty() {
                tracing::warn!(
                    image = %entry.image.path.display(),
                    rejected = ?filtered.rejected,
                    "dropping keywords outside the taxonomy"
                );
                append(&mut result.rejected, &entry.raw, filtered.rejected);
            }
            append(&mut result.keywords, &entry.raw, filtered.accepted);
            bar.inc(1);
        }
        bar.finish_and_clear();
        Ok(result)
    }
}

/// Images sharing a RAW target contribute to one entry, in discovery order.
fn append(map: &mut BTreeMap<PathBuf, Vec<String>>, raw: &Path, keywords: Vec<String>) {
    map.entry(raw.to_path_buf()).or_default().extend(keywords);
}

fn check_inputs(inputs: &RunInputs) -> Result<(), PipelineError> {
    let required = [
        (PathRole::ImageDir, &inputs.image_dir),
        (PathRole::RawSearchRoot, &inputs.raw_search_root),
        (PathRole::Taxonomy, &inputs.taxonomy_path),
    ];
    for (role, path) in required {
        if !path.exists() {
            return Err(PipelineError::PathNotFound {
                role,
                path: path.clone(),
            });
        }
    }
    if !inputs.image_dir.is_dir() {
        return Err(PipelineError::NotADirectory {
            role: PathRole::ImageDir,
            path: inputs.image_dir.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
