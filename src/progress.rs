//! Terminal progress for the per-image phases (RAW lookup and generation).

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{prefix:>20} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}";

#[derive(Debug, Clone, Copy)]
pub struct Progress {
    enabled: bool,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn hidden() -> Self {
        Self::new(false)
    }

    /// Bar over `len` items; hidden bars accept the same calls and draw nothing.
    pub fn bar(&self, len: usize, prefix: &'static str) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_prefix(prefix);
        pb
    }
}
