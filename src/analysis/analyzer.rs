//! Per-session transcript analysis.
//!
//! A transcript is folded line by line into a [`SessionResult`]. The fold
//! carries the most recently matched query; every bundle read is attributed
//! to that query until another one matches. Lines that do not parse are
//! dropped without surfacing an error.

use crate::analysis::matcher::{is_legacy_path, PathClassifier, QueryMatcher, ReadOrigin};
use crate::config::Config;
use crate::models::{SessionCandidate, SessionLine, SessionResult, TestQuery};
use crate::session::TranscriptRecord;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Version inference rules, only used when comparing variants.
#[derive(Debug, Clone)]
pub struct VersionRules {
    /// Labels a marker file may legitimately contain.
    pub known_labels: Vec<String>,
    pub legacy_label: String,
    pub current_label: String,
    pub legacy_dirs: Vec<String>,
    pub legacy_files: Vec<String>,
    /// Marker file inside the installed bundle.
    pub marker_path: PathBuf,
}

impl VersionRules {
    /// Tag the session from one read path.
    fn infer(&self, version: &mut Option<String>, raw_path: &str, first_read: bool) {
        if is_legacy_path(raw_path, &self.legacy_dirs, &self.legacy_files) {
            if version.is_none() {
                *version = Some(self.legacy_label.clone());
            }
        } else if first_read {
            *version = Some(self.current_label.clone());
        }
    }

    /// Label stored in the installed marker, if it is a known one.
    fn installed_label(&self) -> Option<String> {
        let raw = std::fs::read_to_string(&self.marker_path).ok()?;
        let value = raw.trim();
        let label = self
            .known_labels
            .iter()
            .find(|known| known.eq_ignore_ascii_case(value))
            .cloned();
        if label.is_none() {
            debug!(
                "Ignoring unknown version marker '{}' at {}",
                value,
                self.marker_path.display()
            );
        }
        label
    }
}

/// Everything the analyzer needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub queries: Vec<TestQuery>,
    pub project_id: String,
    /// Configured install directory; reads under it are installed reads.
    pub installed_root: Option<String>,
    pub installed_marker: String,
    pub repo_marker: String,
    pub primary_doc: String,
    /// User text must be longer than this many characters to be matched.
    pub min_query_chars: usize,
    /// `None` in single-bundle mode.
    pub versioning: Option<VersionRules>,
}

impl From<&Config> for AnalyzerConfig {
    fn from(config: &Config) -> Self {
        let versioning = if config.analysis.compare_labels.is_empty() {
            None
        } else {
            Some(VersionRules {
                known_labels: config.analysis.compare_labels.clone(),
                legacy_label: config.analysis.legacy_label.clone(),
                current_label: config.analysis.current_label.clone(),
                legacy_dirs: config.analysis.legacy_dirs.clone(),
                legacy_files: config.analysis.legacy_files.clone(),
                marker_path: config.paths.skill_dir().join(&config.skill.marker_file),
            })
        };

        Self {
            queries: config.queries.clone(),
            project_id: config.skill.project_id.clone(),
            installed_root: Some(config.paths.skill_dir().display().to_string()),
            installed_marker: config.skill.installed_marker.clone(),
            repo_marker: config.skill.repo_marker.clone(),
            primary_doc: config.skill.primary_doc.clone(),
            min_query_chars: config.analysis.min_query_chars,
            versioning,
        }
    }
}

/// Accumulator threaded through the per-line fold.
struct ScanState {
    result: SessionResult,
    current_query: Option<String>,
    read_installed: bool,
}

/// Analyzes transcripts for bundle reads and query matches.
pub struct SessionAnalyzer {
    matcher: QueryMatcher,
    classifier: PathClassifier,
    min_query_chars: usize,
    versioning: Option<VersionRules>,
}

impl SessionAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let mut classifier = PathClassifier::new(
            &config.project_id,
            &config.installed_marker,
            &config.repo_marker,
            &config.primary_doc,
        );
        if let Some(ref root) = config.installed_root {
            classifier = classifier.with_installed_root(root);
        }

        Self {
            matcher: QueryMatcher::new(&config.queries),
            classifier,
            min_query_chars: config.min_query_chars,
            versioning: config.versioning,
        }
    }

    pub fn is_comparing(&self) -> bool {
        self.versioning.is_some()
    }

    /// Analyze one transcript file.
    ///
    /// Only failing to open the file is an error; malformed lines are skipped
    /// and a read error mid-file ends the scan with what was gathered so far.
    pub fn analyze_session(&self, path: &Path) -> Result<SessionResult> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open transcript: {}", path.display()))?;
        Ok(self.analyze_reader(path.to_path_buf(), BufReader::new(file)))
    }

    /// Analyze the newest `limit` candidates and keep those with bundle reads.
    ///
    /// The cap applies before the zero-read filter. A transcript that cannot
    /// be opened is skipped.
    pub fn analyze_candidates(
        &self,
        candidates: &[SessionCandidate],
        limit: usize,
    ) -> Vec<(SessionLine, SessionResult)> {
        let mut analyzed = Vec::new();

        for candidate in candidates.iter().take(limit) {
            let result = match self.analyze_session(&candidate.path) {
                Ok(result) => result,
                Err(e) => {
                    warn!("Skipping {}: {:#}", candidate.path.display(), e);
                    continue;
                }
            };

            if result.total_reads == 0 {
                debug!("No skill reads in {}", candidate.path.display());
                continue;
            }

            let line = SessionLine {
                path: candidate.path.clone(),
                modified: candidate.modified,
                version: result.version.clone(),
                total_reads: result.total_reads,
                queries: result.queries.clone(),
            };
            analyzed.push((line, result));
        }

        analyzed
    }

    /// Analyze transcript lines from any buffered reader.
    pub fn analyze_reader<R: BufRead>(&self, path: PathBuf, reader: R) -> SessionResult {
        let records = reader
            .split(b'\n')
            .map_while(|line| line.ok())
            .filter_map(|bytes| {
                std::str::from_utf8(&bytes)
                    .ok()
                    .and_then(TranscriptRecord::parse)
            });
        self.analyze_records(path, records)
    }

    /// Fold parsed records, in transcript order, into a result.
    pub fn analyze_records<I>(&self, path: PathBuf, records: I) -> SessionResult
    where
        I: IntoIterator<Item = TranscriptRecord>,
    {
        let initial = ScanState {
            result: SessionResult::new(path),
            current_query: None,
            read_installed: false,
        };

        let state = records
            .into_iter()
            .fold(initial, |state, record| self.step(state, &record));

        self.finish(state)
    }

    fn step(&self, mut state: ScanState, record: &TranscriptRecord) -> ScanState {
        for raw_path in record.read_paths() {
            self.observe_read(&mut state, &raw_path);
        }

        if let Some(text) = record.user_text() {
            if text.chars().count() > self.min_query_chars {
                if let Some(id) = self.matcher.match_text(text) {
                    state.current_query = Some(id.to_string());
                    state.result.queries.push(id.to_string());
                }
            }
        }

        state
    }

    fn observe_read(&self, state: &mut ScanState, raw_path: &str) {
        if !self.classifier.is_bundle_path(raw_path) {
            return;
        }

        let (short_id, origin) = self.classifier.short_id(raw_path);
        let kind = self.classifier.classify(&short_id);

        if origin == ReadOrigin::Installed {
            state.read_installed = true;
        }
        if let Some(ref query) = state.current_query {
            state.result.attribute_read(query, &short_id);
        }
        state.result.record_read(short_id, kind);

        if let Some(ref rules) = self.versioning {
            let first_read = state.result.total_reads == 1;
            rules.infer(&mut state.result.version, raw_path, first_read);
        }
    }

    fn finish(&self, state: ScanState) -> SessionResult {
        let mut result = state.result;

        if let Some(ref rules) = self.versioning {
            if state.read_installed && result.total_reads > 0 {
                if let Some(label) = rules.installed_label() {
                    result.version = Some(label);
                }
            }
        }

        debug!(
            "Analyzed {}: {} reads, {} queries, version {}",
            result.path.display(),
            result.total_reads,
            result.queries.len(),
            result.version_label()
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    const SAMPLE: &str = include_str!("../../fixtures/sample_session.jsonl");

    fn single_mode() -> AnalyzerConfig {
        let mut config = Config::default();
        config.analysis.compare_labels.clear();
        AnalyzerConfig::from(&config)
    }

    fn comparing(marker_path: PathBuf) -> AnalyzerConfig {
        let mut config = AnalyzerConfig::from(&Config::default());
        if let Some(ref mut rules) = config.versioning {
            rules.marker_path = marker_path;
        }
        config
    }

    fn user(text: &str) -> String {
        serde_json::json!({"type": "user", "message": {"role": "user", "content": text}})
            .to_string()
    }

    fn reads<S: AsRef<str>>(paths: &[S]) -> String {
        let items: Vec<_> = paths
            .iter()
            .map(|p| {
                serde_json::json!({"type": "tool_use", "name": "Read", "input": {"file_path": p.as_ref()}})
            })
            .collect();
        serde_json::json!({"type": "assistant", "message": {"role": "assistant", "content": items}})
            .to_string()
    }

    fn run(analyzer: &SessionAnalyzer, lines: &[String]) -> SessionResult {
        let text = lines.join("\n");
        analyzer.analyze_reader(PathBuf::from("test.jsonl"), Cursor::new(text))
    }

    const INSTALLED: &str = "/Users/me/.claude/skills/orka3-cli/";

    #[test]
    fn test_query_then_reads() {
        let analyzer = SessionAnalyzer::new(single_mode());
        let result = run(
            &analyzer,
            &[
                user("Show me all my VMs"),
                reads(&[
                    &format!("{INSTALLED}SKILL.md"),
                    &format!("{INSTALLED}references/vm-ops.md"),
                ]),
            ],
        );

        assert_eq!(result.queries, vec!["Q2"]);
        assert_eq!(result.total_reads, 2);
        assert_eq!(result.primary_reads, 1);
        assert_eq!(result.reference_reads, 1);
        assert_eq!(
            result.reads_for("Q2"),
            Some(&["SKILL.md".to_string(), "references/vm-ops.md".to_string()][..])
        );
        assert_eq!(result.query_reads.len(), 1);
        assert!(result.counts_consistent());
        assert_eq!(result.version, None);
    }

    #[test]
    fn test_empty_and_garbage_input() {
        let analyzer = SessionAnalyzer::new(single_mode());
        let result = run(
            &analyzer,
            &["".to_string(), "{oops".to_string(), "[1,2".to_string()],
        );
        assert_eq!(result, SessionResult::new(PathBuf::from("test.jsonl")));
        assert!(result.counts_consistent());
    }

    #[test]
    fn test_reads_before_first_query_are_unattributed() {
        let analyzer = SessionAnalyzer::new(single_mode());
        let result = run(
            &analyzer,
            &[
                reads(&[&format!("{INSTALLED}SKILL.md")]),
                user("How do I connect to my VM?"),
                reads(&[&format!("{INSTALLED}references/connect.md")]),
            ],
        );

        assert_eq!(result.total_reads, 2);
        assert_eq!(result.query_reads.len(), 1);
        assert_eq!(
            result.reads_for("Q3"),
            Some(&["references/connect.md".to_string()][..])
        );
    }

    #[test]
    fn test_most_recent_query_wins() {
        let analyzer = SessionAnalyzer::new(single_mode());
        let result = run(
            &analyzer,
            &[
                user("Show me all my VMs"),
                reads(&[&format!("{INSTALLED}references/a.md")]),
                user("How do I connect to my VM?"),
                reads(&[&format!("{INSTALLED}references/b.md")]),
                user("show me all my vms again please"),
                reads(&[&format!("{INSTALLED}references/c.md")]),
            ],
        );

        assert_eq!(result.queries, vec!["Q2", "Q3", "Q2"]);
        assert_eq!(result.query_reads[0].query, "Q2");
        assert_eq!(
            result.reads_for("Q2"),
            Some(&["references/a.md".to_string(), "references/c.md".to_string()][..])
        );
        assert_eq!(
            result.reads_for("Q3"),
            Some(&["references/b.md".to_string()][..])
        );
    }

    #[test]
    fn test_short_user_text_is_ignored() {
        let mut config = single_mode();
        config.queries = vec![TestQuery::new("S", "Tier 1", "list vms")];
        let analyzer = SessionAnalyzer::new(config);

        let result = run(&analyzer, &[user("list vms")]);
        assert!(result.queries.is_empty());

        let result = run(&analyzer, &[user("please list vms")]);
        assert_eq!(result.queries, vec!["S"]);
    }

    #[test]
    fn test_unrelated_reads_are_ignored() {
        let analyzer = SessionAnalyzer::new(single_mode());
        let result = run(
            &analyzer,
            &[
                user("Show me all my VMs"),
                reads(&["/Users/me/project/src/main.rs", "/etc/hosts"]),
            ],
        );
        assert_eq!(result.queries, vec!["Q2"]);
        assert_eq!(result.total_reads, 0);
        assert!(result.query_reads.is_empty());
    }

    #[test]
    fn test_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.jsonl");
        std::fs::write(&path, SAMPLE).unwrap();

        let analyzer = SessionAnalyzer::new(single_mode());
        let first = analyzer.analyze_session(&path).unwrap();
        let second = analyzer.analyze_session(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sample_fixture() {
        let analyzer = SessionAnalyzer::new(single_mode());
        let result = analyzer.analyze_reader(PathBuf::from("sample"), Cursor::new(SAMPLE));

        assert_eq!(result.queries, vec!["Q2", "Q3"]);
        assert_eq!(
            result.skill_reads,
            vec!["SKILL.md", "references/vm-ops.md", "references/connect.md"]
        );
        assert_eq!(result.primary_reads, 1);
        assert_eq!(result.reference_reads, 2);
        assert!(result.counts_consistent());
    }

    #[test]
    fn test_missing_file_is_error() {
        let analyzer = SessionAnalyzer::new(single_mode());
        assert!(analyzer
            .analyze_session(Path::new("/definitely/not/here.jsonl"))
            .is_err());
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let analyzer = SessionAnalyzer::new(single_mode());
        let mut bytes = user("Show me all my VMs").into_bytes();
        bytes.extend_from_slice(b"\n\xff\xfe{\"type\":\"user\"}\n");
        bytes.extend_from_slice(reads(&[&format!("{INSTALLED}SKILL.md")]).as_bytes());

        let result = analyzer.analyze_reader(PathBuf::from("x"), Cursor::new(bytes));
        assert_eq!(result.queries, vec!["Q2"]);
        assert_eq!(result.total_reads, 1);
    }

    #[test]
    fn test_analyze_candidates_caps_then_filters() {
        use crate::session::SessionScanner;
        use filetime::{set_file_mtime, FileTime};
        use std::time::{Duration, SystemTime};

        let temp_dir = TempDir::new().unwrap();
        let project = temp_dir.path().join("-Users-me-demo");
        std::fs::create_dir_all(&project).unwrap();

        let skill_read = reads(&[&format!("{INSTALLED}SKILL.md")]);
        let files = [
            ("newest.jsonl", user("Show me all my VMs"), 60),
            ("middle.jsonl", skill_read.clone(), 120),
            ("oldest.jsonl", skill_read, 180),
        ];
        let now = SystemTime::now();
        for (name, body, age) in &files {
            let path = project.join(name);
            std::fs::write(&path, body).unwrap();
            set_file_mtime(&path, FileTime::from_system_time(now - Duration::from_secs(*age)))
                .unwrap();
        }

        let scanner = SessionScanner::new(temp_dir.path().to_path_buf(), "agent-");
        let candidates = scanner
            .find_candidate_sessions(Duration::from_secs(3600))
            .unwrap();
        assert_eq!(candidates.len(), 3);

        let analyzer = SessionAnalyzer::new(single_mode());
        let analyzed = analyzer.analyze_candidates(&candidates, 2);

        assert_eq!(analyzed.len(), 1);
        let (line, result) = &analyzed[0];
        assert_eq!(line.path, project.join("middle.jsonl"));
        assert_eq!(line.total_reads, 1);
        assert_eq!(result.skill_reads, vec!["SKILL.md"]);

        assert_eq!(analyzer.analyze_candidates(&candidates, 10).len(), 2);
    }

    #[test]
    fn test_analyze_candidates_skips_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let readable = temp_dir.path().join("ok.jsonl");
        std::fs::write(&readable, reads(&[&format!("{INSTALLED}SKILL.md")])).unwrap();

        let modified = chrono::Local::now();
        let candidates = vec![
            SessionCandidate {
                path: temp_dir.path().join("vanished.jsonl"),
                modified,
            },
            SessionCandidate {
                path: readable.clone(),
                modified,
            },
        ];

        let analyzer = SessionAnalyzer::new(single_mode());
        let analyzed = analyzer.analyze_candidates(&candidates, 10);
        assert_eq!(analyzed.len(), 1);
        assert_eq!(analyzed[0].0.path, readable);
    }

    #[test]
    fn test_version_from_first_read() {
        let temp_dir = TempDir::new().unwrap();
        let analyzer = SessionAnalyzer::new(comparing(temp_dir.path().join("none")));

        let result = run(
            &analyzer,
            &[reads(&[
                "/Users/me/Code/orka3-cli-claude-skill/skill/SKILL.md",
                "/Users/me/Code/orka3-cli-claude-skill/skill/commands/command-reference.md",
            ])],
        );
        assert_eq!(result.version.as_deref(), Some("v2"));
    }

    #[test]
    fn test_version_legacy_first_read() {
        let temp_dir = TempDir::new().unwrap();
        let analyzer = SessionAnalyzer::new(comparing(temp_dir.path().join("none")));

        let result = run(
            &analyzer,
            &[reads(&[
                "/Users/me/Code/orka3-cli-claude-skill/skill/workflows/workflows.md",
                "/Users/me/Code/orka3-cli-claude-skill/skill/SKILL.md",
            ])],
        );
        assert_eq!(result.version.as_deref(), Some("v1"));
    }

    #[test]
    fn test_marker_overrides_inferred_version() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join(".skill-version");
        std::fs::write(&marker, "v3\n").unwrap();
        let analyzer = SessionAnalyzer::new(comparing(marker));

        let result = run(&analyzer, &[reads(&[&format!("{INSTALLED}SKILL.md")])]);
        assert_eq!(result.version.as_deref(), Some("v3"));
    }

    #[test]
    fn test_marker_ignored_for_repository_reads() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join(".skill-version");
        std::fs::write(&marker, "v3").unwrap();
        let analyzer = SessionAnalyzer::new(comparing(marker));

        let result = run(
            &analyzer,
            &[reads(&["/Users/me/Code/orka3-cli-claude-skill/skill/SKILL.md"])],
        );
        assert_eq!(result.version.as_deref(), Some("v2"));
    }

    #[test]
    fn test_marker_read_from_configured_skill_dir() {
        let temp_dir = TempDir::new().unwrap();
        let skill_dir = temp_dir.path().join("skills").join("orka3-cli");
        std::fs::create_dir_all(&skill_dir).unwrap();
        std::fs::write(skill_dir.join(".skill-version"), "v3").unwrap();

        let mut config = Config::default();
        config.merge_with_args(&crate::config::AnalysisOverrides {
            skill_dir: Some(skill_dir.clone()),
            ..Default::default()
        });
        let analyzer = SessionAnalyzer::new(AnalyzerConfig::from(&config));

        let read = skill_dir.join("SKILL.md").display().to_string();
        let result = run(&analyzer, &[reads(&[read])]);
        assert_eq!(result.skill_reads, vec!["SKILL.md"]);
        assert_eq!(result.version.as_deref(), Some("v3"));
    }

    #[test]
    fn test_unknown_marker_keeps_inferred_version() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join(".skill-version");
        std::fs::write(&marker, "repo").unwrap();
        let analyzer = SessionAnalyzer::new(comparing(marker));

        let result = run(&analyzer, &[reads(&[&format!("{INSTALLED}SKILL.md")])]);
        assert_eq!(result.version.as_deref(), Some("v2"));
    }
}
