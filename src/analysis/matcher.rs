//! Query matching and read classification.
//!
//! Both sides of a query match are normalized the same way: lower-cased,
//! stripped of everything but letters, digits and whitespace, with
//! whitespace runs collapsed. File paths are reduced to a short identifier
//! relative to the bundle root they were read from.

use crate::models::{ReadKind, TestQuery};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("valid non-word pattern"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Normalize text for fuzzy query matching.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = NON_WORD_RE.replace_all(&lowered, "");
    WHITESPACE_RE
        .replace_all(stripped.trim(), " ")
        .into_owned()
}

/// Matches user text against the fixed query list, first definition wins.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    /// (query id, normalized text), in definition order.
    entries: Vec<(String, String)>,
}

impl QueryMatcher {
    pub fn new(queries: &[TestQuery]) -> Self {
        let entries = queries
            .iter()
            .filter_map(|q| {
                let normalized = normalize(&q.text);
                if normalized.is_empty() {
                    warn!("Query {} normalizes to empty text, ignoring it", q.id);
                    None
                } else {
                    Some((q.id.clone(), normalized))
                }
            })
            .collect();
        Self { entries }
    }

    /// Id of the first query whose normalized text occurs in `text`.
    pub fn match_text(&self, text: &str) -> Option<&str> {
        let haystack = normalize(text);
        self.entries
            .iter()
            .find(|(_, needle)| haystack.contains(needle.as_str()))
            .map(|(id, _)| id.as_str())
    }
}

/// Which bundle root a read path was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrigin {
    /// The installed skill directory.
    Installed,
    /// The repository's bundle directory.
    Repository,
    /// Neither root matched; generic trim.
    Other,
}

/// Recognises bundle reads and derives their short identifiers.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    project_id: String,
    /// Configured install directory with a trailing `/`, checked first.
    installed_root: Option<String>,
    installed_marker: String,
    repo_marker: String,
    primary_doc: String,
}

impl PathClassifier {
    pub fn new(
        project_id: &str,
        installed_marker: &str,
        repo_marker: &str,
        primary_doc: &str,
    ) -> Self {
        Self {
            project_id: project_id.to_ascii_lowercase(),
            installed_root: None,
            installed_marker: installed_marker.to_string(),
            repo_marker: repo_marker.to_string(),
            primary_doc: primary_doc.to_string(),
        }
    }

    /// Also treat reads under `root` as installed reads.
    pub fn with_installed_root(mut self, root: &str) -> Self {
        let trimmed = root.trim_end_matches('/');
        self.installed_root = (!trimmed.is_empty()).then(|| format!("{}/", trimmed));
        self
    }

    /// True when the path mentions the project id (case-insensitive).
    pub fn is_bundle_path(&self, path: &str) -> bool {
        path.to_ascii_lowercase().contains(&self.project_id)
    }

    /// Short identifier of a read, checked installed root first, then the
    /// repository root, then the generic trim. Never empty.
    pub fn short_id(&self, path: &str) -> (String, ReadOrigin) {
        let installed = self
            .installed_root
            .as_deref()
            .and_then(|root| after_last(path, root))
            .or_else(|| after_last(path, &self.installed_marker));
        if let Some(rest) = installed {
            return (rest.to_string(), ReadOrigin::Installed);
        }
        if let Some(rest) = after_last(path, &self.repo_marker) {
            return (rest.to_string(), ReadOrigin::Repository);
        }
        (self.generic_trim(path).to_string(), ReadOrigin::Other)
    }

    pub fn classify(&self, short_id: &str) -> ReadKind {
        if short_id == self.primary_doc {
            ReadKind::Primary
        } else {
            ReadKind::Reference
        }
    }

    /// Everything after the last case-insensitive occurrence of the project id.
    fn generic_trim<'a>(&self, path: &'a str) -> &'a str {
        // ASCII lower-casing keeps byte offsets identical to `path`.
        let lowered = path.to_ascii_lowercase();
        let trimmed = lowered
            .rfind(&self.project_id)
            .map(|idx| path[idx + self.project_id.len()..].trim_start_matches('/'))
            .unwrap_or("");
        if trimmed.is_empty() {
            path
        } else {
            trimmed
        }
    }
}

/// Non-empty text after the last occurrence of `needle`.
fn after_last<'a>(haystack: &'a str, needle: &str) -> Option<&'a str> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .rfind(needle)
        .map(|idx| &haystack[idx + needle.len()..])
        .filter(|rest| !rest.is_empty())
}

/// True when `path` sits under a legacy directory and names a legacy file.
pub fn is_legacy_path(path: &str, legacy_dirs: &[String], legacy_files: &[String]) -> bool {
    let in_legacy_dir = legacy_dirs.iter().any(|dir| path.contains(dir.as_str()));
    if !in_legacy_dir {
        return false;
    }
    let file_name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    legacy_files.iter().any(|f| f == file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> PathClassifier {
        PathClassifier::new(
            "orka3-cli",
            "/.claude/skills/orka3-cli/",
            "/skill/",
            "SKILL.md",
        )
    }

    fn queries() -> Vec<TestQuery> {
        vec![
            TestQuery::new("Q1", "Tier 1", "Deploy a VM with macOS Sonoma"),
            TestQuery::new("Q2", "Tier 1", "Show me all my VMs"),
            TestQuery::new("Q3", "Tier 1", "How do I connect to my VM?"),
        ]
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  How do I connect to my VM? "), "how do i connect to my vm");
        assert_eq!(normalize("I'm getting an\tauthentication   error!"), "im getting an authentication error");
        assert_eq!(normalize("snake_case & co."), "snakecase co");
        assert_eq!(normalize("?!"), "");
    }

    #[test]
    fn test_match_ignores_case_and_punctuation() {
        let matcher = QueryMatcher::new(&queries());
        assert_eq!(
            matcher.match_text("hey, SHOW me all my vms!!! thanks"),
            Some("Q2")
        );
        assert_eq!(matcher.match_text("how do i connect to my vm"), Some("Q3"));
        assert_eq!(matcher.match_text("something unrelated entirely"), None);
    }

    #[test]
    fn test_first_defined_query_wins() {
        let matcher = QueryMatcher::new(&queries());
        let text = "How do I connect to my VM? Also: show me all my VMs.";
        assert_eq!(matcher.match_text(text), Some("Q2"));
    }

    #[test]
    fn test_empty_normalized_query_is_dropped() {
        let matcher = QueryMatcher::new(&[
            TestQuery::new("X", "Tier 0", "???"),
            TestQuery::new("Q2", "Tier 1", "Show me all my VMs"),
        ]);
        assert_eq!(matcher.match_text("anything at all here"), None);
        assert_eq!(matcher.match_text("show me all my vms"), Some("Q2"));
    }

    #[test]
    fn test_short_id_installed_root() {
        let (id, origin) =
            classifier().short_id("/Users/me/.claude/skills/orka3-cli/references/vm-ops.md");
        assert_eq!(id, "references/vm-ops.md");
        assert_eq!(origin, ReadOrigin::Installed);
    }

    #[test]
    fn test_short_id_repository_root() {
        let (id, origin) =
            classifier().short_id("/Users/me/Code/orka3-cli-claude-skill/skill/SKILL.md");
        assert_eq!(id, "SKILL.md");
        assert_eq!(origin, ReadOrigin::Repository);
    }

    #[test]
    fn test_short_id_fallback() {
        let c = classifier();
        assert_eq!(
            c.short_id("/tmp/ORKA3-CLI/docs/intro.md"),
            ("docs/intro.md".to_string(), ReadOrigin::Other)
        );
        assert_eq!(
            c.short_id("/tmp/orka3-cli"),
            ("/tmp/orka3-cli".to_string(), ReadOrigin::Other)
        );
    }

    #[test]
    fn test_short_id_custom_installed_root() {
        let c = classifier().with_installed_root("/opt/skills/orka3-cli/");
        assert_eq!(
            c.short_id("/opt/skills/orka3-cli/references/auth.md"),
            ("references/auth.md".to_string(), ReadOrigin::Installed)
        );
        assert_eq!(
            c.short_id("/Users/me/.claude/skills/orka3-cli/SKILL.md"),
            ("SKILL.md".to_string(), ReadOrigin::Installed)
        );

        let bare = classifier().with_installed_root("/opt/skills/orka3-cli");
        assert_eq!(
            bare.short_id("/opt/skills/orka3-cli/SKILL.md").1,
            ReadOrigin::Installed
        );
    }

    #[test]
    fn test_is_bundle_path_case_insensitive() {
        let c = classifier();
        assert!(c.is_bundle_path("/x/Orka3-CLI/SKILL.md"));
        assert!(!c.is_bundle_path("/x/other/SKILL.md"));
    }

    #[test]
    fn test_classify() {
        let c = classifier();
        assert_eq!(c.classify("SKILL.md"), ReadKind::Primary);
        assert_eq!(c.classify("references/SKILL.md"), ReadKind::Reference);
        assert_eq!(c.classify("skill.md"), ReadKind::Reference);
    }

    #[test]
    fn test_is_legacy_path() {
        let dirs = vec!["/commands/".to_string(), "/workflows/".to_string()];
        let files = vec!["command-reference.md".to_string(), "workflows.md".to_string()];
        assert!(is_legacy_path("/s/orka3-cli/commands/command-reference.md", &dirs, &files));
        assert!(is_legacy_path("/s/orka3-cli/workflows/workflows.md", &dirs, &files));
        assert!(!is_legacy_path("/s/orka3-cli/commands/vm.md", &dirs, &files));
        assert!(!is_legacy_path("/s/orka3-cli/command-reference.md", &dirs, &files));
    }
}
