//! Installing a bundle variant into the assistant's skill directory.
//!
//! Installation replaces the target tree: the old directory is removed and
//! the source is copied in. This is not atomic, and a crash mid-copy leaves
//! a partially populated target.

use crate::config::{Config, VariantConfig};
use crate::error::HarnessError;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// What an installation did.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub label: String,
    pub description: String,
    pub source: PathBuf,
    pub target: PathBuf,
    pub files_copied: usize,
    /// Sorted top-level names in the installed references directory.
    pub reference_files: Vec<String>,
    /// The source was created from the repository bundle during this run.
    pub seeded: bool,
    pub marker_written: bool,
}

/// Installs configured variants.
pub struct Installer<'a> {
    config: &'a Config,
    show_progress: bool,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a Config, show_progress: bool) -> Self {
        Self {
            config,
            show_progress,
        }
    }

    /// Look up a variant by label, case-insensitively.
    pub fn resolve(&self, label: &str) -> Result<&'a VariantConfig, HarnessError> {
        self.config
            .variants
            .iter()
            .find(|v| v.label.eq_ignore_ascii_case(label))
            .ok_or_else(|| {
                let known: Vec<_> = self
                    .config
                    .variant_labels()
                    .iter()
                    .map(|l| format!("'{}'", l))
                    .collect();
                HarnessError::Configuration(format!(
                    "unknown variant '{}'. Use {}",
                    label,
                    known.join(", ")
                ))
            })
    }

    /// Install a variant, replacing whatever is currently installed.
    pub fn install(&self, label: &str) -> Result<InstallOutcome, HarnessError> {
        let variant = self.resolve(label)?;
        let paths = &self.config.paths;
        let source = variant.source_dir(paths);
        let target = paths.skill_dir();
        let repo_dir = paths.repo_skill_dir();

        let mut seeded = false;
        if !source.exists() && variant.seed_from_repo && repo_dir.is_dir() {
            info!(
                "Creating {} backup from {}",
                variant.label,
                repo_dir.display()
            );
            println!(
                "Creating {} backup from {}...",
                variant.label,
                repo_dir.display()
            );
            copy_tree(&repo_dir, &source, None)?;
            seeded = true;
        }

        if !source.is_dir() {
            return Err(HarnessError::NotFound {
                path: source,
                guidance: missing_source_guidance(variant),
            });
        }

        check_disjoint(&source, &target)?;

        if target.exists() {
            debug!("Removing existing install at {}", target.display());
            fs::remove_dir_all(&target).map_err(|e| HarnessError::io(&target, e))?;
        }

        let progress = self.progress_bar();
        let files_copied = copy_tree(&source, &target, progress.as_ref())?;
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let marker_written = if variant.write_marker {
            let marker = target.join(&self.config.skill.marker_file);
            fs::write(&marker, &variant.label).map_err(|e| HarnessError::io(&marker, e))?;
            true
        } else {
            false
        };

        info!(
            "Installed {} ({} files) into {}",
            variant.label,
            files_copied,
            target.display()
        );

        Ok(InstallOutcome {
            label: variant.label.clone(),
            description: variant.description.clone(),
            source,
            reference_files: list_reference_files(&target.join(&self.config.skill.references_dir)),
            target,
            files_copied,
            seeded,
            marker_written,
        })
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        Some(pb)
    }
}

fn missing_source_guidance(variant: &VariantConfig) -> String {
    if variant.source.is_none() {
        "Run this from the repository root, where the skill/ directory lives.".to_string()
    } else if variant.seed_from_repo {
        "Run from the skill repository directory so the backup can be created from skill/."
            .to_string()
    } else {
        format!(
            "Create the backup first by copying the {} bundle to that directory.",
            variant.label
        )
    }
}

/// Refuse to install when source and target overlap.
fn check_disjoint(source: &Path, target: &Path) -> Result<(), HarnessError> {
    let source = fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());
    let target = fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf());

    if source.starts_with(&target) || target.starts_with(&source) {
        return Err(HarnessError::Configuration(format!(
            "source {} and install target {} overlap",
            source.display(),
            target.display()
        )));
    }
    Ok(())
}

/// Recursively copy `source` into `target`, preserving relative paths.
/// Returns the number of files copied.
pub fn copy_tree(
    source: &Path,
    target: &Path,
    progress: Option<&ProgressBar>,
) -> Result<usize, HarnessError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            HarnessError::io(path, e.into())
        })?;
        entries.push(entry);
    }

    if let Some(pb) = progress {
        let files = entries.iter().filter(|e| e.file_type().is_file()).count();
        pb.set_length(files as u64);
    }

    let mut copied = 0;
    for entry in entries {
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let dest = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| HarnessError::io(&dest, e))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
            }
            fs::copy(entry.path(), &dest).map_err(|e| HarnessError::io(entry.path(), e))?;
            copied += 1;
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }
    }

    Ok(copied)
}

/// Sorted entry names directly inside `dir`; empty when it does not exist.
pub fn list_reference_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
