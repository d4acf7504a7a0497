//! Discovery of recently modified session transcripts.
//!
//! Transcripts live one directory per project under the sessions root.
//! Sub-agent transcripts are excluded by file name only.

use crate::models::SessionCandidate;
use anyhow::Result;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;
use walkdir::WalkDir;

/// Scanner over the per-project transcript directories.
pub struct SessionScanner {
    sessions_dir: PathBuf,
    subagent_prefix: String,
}

impl SessionScanner {
    pub fn new(sessions_dir: PathBuf, subagent_prefix: impl Into<String>) -> Self {
        Self {
            sessions_dir,
            subagent_prefix: subagent_prefix.into(),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.paths.sessions_dir(),
            config.analysis.subagent_prefix.clone(),
        )
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Transcripts modified within `window` of now, newest first.
    pub fn find_candidate_sessions(&self, window: Duration) -> Result<Vec<SessionCandidate>> {
        self.find_modified_after(SystemTime::now().checked_sub(window))
    }

    fn find_modified_after(&self, cutoff: Option<SystemTime>) -> Result<Vec<SessionCandidate>> {
        if !self.sessions_dir.is_dir() {
            debug!(
                "Sessions directory does not exist: {}",
                self.sessions_dir.display()
            );
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();

        let walker = WalkDir::new(&self.sessions_dir)
            .min_depth(2)
            .max_depth(2)
            .follow_links(true);

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Cannot read session entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.is_transcript(entry.path()) {
                continue;
            }

            let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
                Some(t) => t,
                None => {
                    debug!("No modification time for {}", entry.path().display());
                    continue;
                }
            };

            if let Some(cutoff) = cutoff {
                if modified <= cutoff {
                    continue;
                }
            }

            sessions.push(SessionCandidate {
                path: entry.into_path(),
                modified: DateTime::<Local>::from(modified),
            });
        }

        sessions.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.path.cmp(&b.path))
        });

        debug!("Found {} candidate sessions", sessions.len());
        Ok(sessions)
    }

    /// `*.jsonl` files that are not sub-agent transcripts.
    fn is_transcript(&self, path: &Path) -> bool {
        let is_jsonl = path.extension().and_then(|e| e.to_str()) == Some("jsonl");
        let is_subagent = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| !self.subagent_prefix.is_empty() && n.starts_with(&self.subagent_prefix))
            .unwrap_or(false);
        is_jsonl && !is_subagent
    }
}
