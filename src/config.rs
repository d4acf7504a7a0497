//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.skillprobe.toml` files. Everything the harness needs to know about
//! the bundle under test (paths, variants, the test queries) lives here
//! and is handed to the installer and analyzer explicitly.

use crate::error::HarnessError;
use crate::models::TestQuery;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".skillprobe.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Filesystem locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Layout of the documentation bundle.
    #[serde(default)]
    pub skill: SkillConfig,

    /// Session analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Installable bundle variants.
    #[serde(default = "default_variants")]
    pub variants: Vec<VariantConfig>,

    /// Fixed test queries, in matching priority order.
    #[serde(default = "default_queries")]
    pub queries: Vec<TestQuery>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            skill: SkillConfig::default(),
            analysis: AnalysisConfig::default(),
            variants: default_variants(),
            queries: default_queries(),
        }
    }
}

/// Filesystem locations. A leading `~` expands to the home directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where the assistant loads the skill from (install target).
    #[serde(default = "default_skill_dir")]
    pub skill_dir: String,

    /// Root of the per-project session transcript directories.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: String,

    /// The bundle checked into the current repository.
    #[serde(default = "default_repo_skill_dir")]
    pub repo_skill_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            skill_dir: default_skill_dir(),
            sessions_dir: default_sessions_dir(),
            repo_skill_dir: default_repo_skill_dir(),
        }
    }
}

impl PathsConfig {
    pub fn skill_dir(&self) -> PathBuf {
        expand_home(&self.skill_dir)
    }

    pub fn sessions_dir(&self) -> PathBuf {
        expand_home(&self.sessions_dir)
    }

    pub fn repo_skill_dir(&self) -> PathBuf {
        expand_home(&self.repo_skill_dir)
    }
}

fn default_skill_dir() -> String {
    "~/.claude/skills/orka3-cli".to_string()
}

fn default_sessions_dir() -> String {
    "~/.claude/projects".to_string()
}

fn default_repo_skill_dir() -> String {
    "skill".to_string()
}

/// Layout of the documentation bundle and how its reads show up in paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillConfig {
    /// Substring identifying a read as belonging to this bundle.
    #[serde(default = "default_project_id")]
    pub project_id: String,

    /// Entry-point document name.
    #[serde(default = "default_primary_doc")]
    pub primary_doc: String,

    /// Version marker written into the installed bundle.
    #[serde(default = "default_marker_file")]
    pub marker_file: String,

    /// Path fragment of the installed-skill root.
    #[serde(default = "default_installed_marker")]
    pub installed_marker: String,

    /// Path fragment of the repository bundle root.
    #[serde(default = "default_repo_marker")]
    pub repo_marker: String,

    /// Subdirectory holding reference documents.
    #[serde(default = "default_references_dir")]
    pub references_dir: String,
}

impl Default for SkillConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            primary_doc: default_primary_doc(),
            marker_file: default_marker_file(),
            installed_marker: default_installed_marker(),
            repo_marker: default_repo_marker(),
            references_dir: default_references_dir(),
        }
    }
}

fn default_project_id() -> String {
    "orka3-cli".to_string()
}

fn default_primary_doc() -> String {
    "SKILL.md".to_string()
}

fn default_marker_file() -> String {
    ".skill-version".to_string()
}

fn default_installed_marker() -> String {
    "/.claude/skills/orka3-cli/".to_string()
}

fn default_repo_marker() -> String {
    "/skill/".to_string()
}

fn default_references_dir() -> String {
    "references".to_string()
}

/// Session analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Only sessions modified within this many hours are considered.
    #[serde(default = "default_recency_hours")]
    pub recency_hours: u64,

    /// Cap on the number of (newest) sessions analyzed.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// User text must be longer than this to be matched against queries.
    #[serde(default = "default_min_query_chars")]
    pub min_query_chars: usize,

    /// File-name prefix of sub-agent transcripts, which are skipped.
    #[serde(default = "default_subagent_prefix")]
    pub subagent_prefix: String,

    /// Variant labels compared in the report. Empty means single-bundle mode.
    #[serde(default = "default_compare_labels")]
    pub compare_labels: Vec<String>,

    /// Label assigned to sessions whose reads hit the legacy layout.
    #[serde(default = "default_legacy_label")]
    pub legacy_label: String,

    /// Label assigned to sessions whose first read uses the current layout.
    #[serde(default = "default_current_label")]
    pub current_label: String,

    /// Directory fragments of the legacy layout.
    #[serde(default = "default_legacy_dirs")]
    pub legacy_dirs: Vec<String>,

    /// File names only the legacy layout has.
    #[serde(default = "default_legacy_files")]
    pub legacy_files: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            recency_hours: default_recency_hours(),
            max_sessions: default_max_sessions(),
            min_query_chars: default_min_query_chars(),
            subagent_prefix: default_subagent_prefix(),
            compare_labels: default_compare_labels(),
            legacy_label: default_legacy_label(),
            current_label: default_current_label(),
            legacy_dirs: default_legacy_dirs(),
            legacy_files: default_legacy_files(),
        }
    }
}

fn default_recency_hours() -> u64 {
    2
}

fn default_max_sessions() -> usize {
    10
}

fn default_min_query_chars() -> usize {
    10
}

fn default_subagent_prefix() -> String {
    "agent-".to_string()
}

fn default_compare_labels() -> Vec<String> {
    vec!["v1", "v2", "v3"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_legacy_label() -> String {
    "v1".to_string()
}

fn default_current_label() -> String {
    "v2".to_string()
}

fn default_legacy_dirs() -> Vec<String> {
    vec!["/commands/", "/workflows/", "/troubleshooting/"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_legacy_files() -> Vec<String> {
    vec!["command-reference.md", "workflows.md", "troubleshooting.md"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// One installable version of the bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantConfig {
    pub label: String,

    #[serde(default)]
    pub description: String,

    /// Source directory. `None` installs straight from the repository bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Copy the repository bundle into `source` when it does not exist yet.
    #[serde(default)]
    pub seed_from_repo: bool,

    /// Write the label into the installed bundle's marker file.
    #[serde(default = "default_true")]
    pub write_marker: bool,
}

impl VariantConfig {
    /// Resolved source directory for this variant.
    pub fn source_dir(&self, paths: &PathsConfig) -> PathBuf {
        match self.source {
            Some(ref source) => expand_home(source),
            None => paths.repo_skill_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_variants() -> Vec<VariantConfig> {
    vec![
        VariantConfig {
            label: "v1".to_string(),
            description: "monolithic (708-line SKILL.md)".to_string(),
            source: Some("/tmp/orka3-skill-v1-backup".to_string()),
            seed_from_repo: false,
            write_marker: true,
        },
        VariantConfig {
            label: "v2".to_string(),
            description: "restructured (current installed)".to_string(),
            source: Some("/tmp/orka3-skill-backup".to_string()),
            seed_from_repo: false,
            write_marker: true,
        },
        VariantConfig {
            label: "v3".to_string(),
            description: "rewritten (~216-line SKILL.md + fixed refs)".to_string(),
            source: Some("/tmp/orka3-skill-v3-backup".to_string()),
            seed_from_repo: true,
            write_marker: true,
        },
        VariantConfig {
            label: "repo".to_string(),
            description: "repository skill/ directory".to_string(),
            source: None,
            seed_from_repo: false,
            write_marker: false,
        },
    ]
}

fn default_queries() -> Vec<TestQuery> {
    [
        ("Q1", "Tier 1", "Deploy a VM with macOS Sonoma"),
        ("Q2", "Tier 1", "Show me all my VMs"),
        ("Q3", "Tier 1", "How do I connect to my VM?"),
        ("Q5", "Tier 2", "Set up a service account for Jenkins"),
        ("Q8", "Tier 3", "How do I create a golden image for my team?"),
        ("Q12", "Tier 4", "Who has access to the production namespace?"),
        ("Q18", "Tier 6", "I'm getting an authentication error"),
        ("Q22", "Tier 7", "How do I suspend an Intel VM?"),
        ("Q25", "Tier 8", "Best practices for remote developers using Orka?"),
        ("Q27", "Tier 8", "Where can I find audit logs for VM operations?"),
    ]
    .into_iter()
    .map(|(id, tier, text)| TestQuery::new(id, tier, text))
    .collect()
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(raw));
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Overrides the analyze subcommand can apply on top of the file.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOverrides {
    pub hours: Option<u64>,
    pub limit: Option<usize>,
    pub sessions_dir: Option<PathBuf>,
    pub skill_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with analyze-time CLI overrides.
    ///
    /// CLI values take precedence and only apply when explicitly given.
    pub fn merge_with_args(&mut self, overrides: &AnalysisOverrides) {
        if let Some(hours) = overrides.hours {
            self.analysis.recency_hours = hours;
        }
        if let Some(limit) = overrides.limit {
            self.analysis.max_sessions = limit;
        }
        if let Some(ref dir) = overrides.sessions_dir {
            self.paths.sessions_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref dir) = overrides.skill_dir {
            self.paths.skill_dir = dir.to_string_lossy().to_string();
        }
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.analysis.recency_hours == 0 {
            return Err(HarnessError::Configuration(
                "recency_hours must be at least 1".to_string(),
            ));
        }
        if self.analysis.max_sessions == 0 {
            return Err(HarnessError::Configuration(
                "max_sessions must be at least 1".to_string(),
            ));
        }
        if self.skill.project_id.trim().is_empty() {
            return Err(HarnessError::Configuration(
                "skill.project_id must not be empty".to_string(),
            ));
        }

        let mut labels = HashSet::new();
        for variant in &self.variants {
            if !labels.insert(variant.label.to_lowercase()) {
                return Err(HarnessError::Configuration(format!(
                    "duplicate variant label '{}'",
                    variant.label
                )));
            }
        }

        for label in &self.analysis.compare_labels {
            if !labels.contains(&label.to_lowercase()) {
                return Err(HarnessError::Configuration(format!(
                    "compare label '{}' is not a configured variant",
                    label
                )));
            }
        }

        let mut ids = HashSet::new();
        for query in &self.queries {
            if !ids.insert(query.id.as_str()) {
                return Err(HarnessError::Configuration(format!(
                    "duplicate query id '{}'",
                    query.id
                )));
            }
            if query.text.trim().is_empty() {
                return Err(HarnessError::Configuration(format!(
                    "query '{}' has empty text",
                    query.id
                )));
            }
        }

        Ok(())
    }

    /// Labels of all configured variants, in definition order.
    pub fn variant_labels(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.label.as_str()).collect()
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
