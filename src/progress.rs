#![forbid(unsafe_code)]

//! Optional machine-readable progress file, rewritten atomically so a
//! watcher never sees a partial document.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::export::ExportEvent;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressReport {
    progress: u8,
    message: String,
}

#[derive(Debug, Clone)]
pub struct ProgressWriter {
    path: PathBuf,
}

impl ProgressWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Best effort: failures are logged and otherwise ignored.
    pub fn write(&self, progress: u8, message: &str) {
        let report = ProgressReport {
            progress: progress.min(100),
            message: message.to_string(),
        };
        if let Err(err) = self.replace_report(&report) {
            warn!(path = %self.path.display(), "progress update skipped: {err:#}");
        }
    }

    fn replace_report(&self, report: &ProgressReport) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let payload = serde_json::to_vec(report).context("serializing progress report")?;
        let staged = self.path.with_extension("tmp");
        fs::write(&staged, payload).with_context(|| format!("writing {}", staged.display()))?;
        fs::rename(&staged, &self.path)
            .with_context(|| format!("moving {} into place", staged.display()))
    }

    /// Maps export milestones onto a percentage. Enumeration counts as the
    /// first 10%, detail fetching fills the rest.
    pub fn record(&self, event: ExportEvent) {
        match event {
            ExportEvent::Enumerated { videos } => {
                self.write(10, &format!("Found {videos} videos"));
            }
            ExportEvent::Fetched { done, total } => {
                let percent = 10 + (done * 89 / total.max(1)) as u8;
                self.write(percent, &format!("Fetched details {done}/{total}"));
            }
            ExportEvent::Written { rows } => {
                self.write(100, &format!("Saved {rows} videos"));
            }
        }
    }
}
