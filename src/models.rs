//! Data models for the skill harness.
//!
//! This module contains the core data structures shared by the analyzer,
//! the aggregator and the report generator.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// A fixed natural-language query the operator runs against the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestQuery {
    /// Short identifier, e.g. `Q2`.
    pub id: String,
    /// Difficulty tier label.
    pub tier: String,
    /// Literal query text.
    pub text: String,
}

impl TestQuery {
    pub fn new(id: &str, tier: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            tier: tier.to_string(),
            text: text.to_string(),
        }
    }
}

/// Role of a documentation file within the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadKind {
    /// The entry-point document.
    Primary,
    /// Any other document in the bundle.
    Reference,
}

/// Files read while one query was the most recent match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryReads {
    pub query: String,
    pub files: Vec<String>,
}

/// Per-transcript analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Transcript file the result was derived from.
    pub path: PathBuf,
    /// Matched query ids in order of appearance (duplicates allowed).
    pub queries: Vec<String>,
    /// Short identifiers of bundle files read, in encounter order.
    pub skill_reads: Vec<String>,
    pub total_reads: usize,
    pub primary_reads: usize,
    pub reference_reads: usize,
    /// Variant label, when it could be inferred.
    pub version: Option<String>,
    /// Reads attributed to the most recently matched query, in first-attribution order.
    pub query_reads: Vec<QueryReads>,
}

impl SessionResult {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    /// Files attributed to a query, if any were.
    pub fn reads_for(&self, query: &str) -> Option<&[String]> {
        self.query_reads
            .iter()
            .find(|bucket| bucket.query == query)
            .map(|bucket| bucket.files.as_slice())
    }

    /// Record one classified read.
    pub fn record_read(&mut self, short_id: String, kind: ReadKind) {
        match kind {
            ReadKind::Primary => self.primary_reads += 1,
            ReadKind::Reference => self.reference_reads += 1,
        }
        self.total_reads += 1;
        self.skill_reads.push(short_id);
    }

    /// Append a file to a query's bucket, creating the bucket on first use.
    pub fn attribute_read(&mut self, query: &str, short_id: &str) {
        match self.query_reads.iter_mut().find(|b| b.query == query) {
            Some(bucket) => bucket.files.push(short_id.to_string()),
            None => self.query_reads.push(QueryReads {
                query: query.to_string(),
                files: vec![short_id.to_string()],
            }),
        }
    }

    /// `primary + reference == total == skill_reads.len()`.
    pub fn counts_consistent(&self) -> bool {
        self.primary_reads + self.reference_reads == self.total_reads
            && self.total_reads == self.skill_reads.len()
    }

    /// Version label for display.
    pub fn version_label(&self) -> &str {
        self.version.as_deref().unwrap_or("unknown")
    }
}

/// A transcript file eligible for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCandidate {
    pub path: PathBuf,
    pub modified: DateTime<Local>,
}

/// One analyzed session as it appears in the report listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLine {
    pub path: PathBuf,
    pub modified: DateTime<Local>,
    pub version: Option<String>,
    pub total_reads: usize,
    pub queries: Vec<String>,
}

/// Aggregate statistics for one variant group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub label: String,
    pub sessions: usize,
    pub total_queries: usize,
    pub total_reads: usize,
    pub primary_reads: usize,
    pub reference_reads: usize,
    pub unique_files: BTreeSet<String>,
    /// Only present when at least one query matched.
    pub avg_reads_per_query: Option<f64>,
}

impl GroupSummary {
    pub fn has_data(&self) -> bool {
        self.sessions > 0
    }
}

/// How many times more reads the least efficient group needed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Efficiency {
    Finite(f64),
    /// The most efficient group needed zero reads per query.
    Unbounded,
}

impl fmt::Display for Efficiency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Efficiency::Finite(ratio) => write!(f, "{:.1}x", ratio),
            Efficiency::Unbounded => write!(f, "∞x"),
        }
    }
}

/// Reads-per-query for one group, as used by the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRatio {
    pub label: String,
    pub reads_per_query: f64,
}

/// Comparative verdict across groups with data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Sorted by label.
    pub ratios: Vec<GroupRatio>,
    pub most_efficient: String,
    pub least_efficient: String,
    pub factor: Efficiency,
}

/// The complete analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Local>,
    pub window_hours: u64,
    /// True when sessions are split by variant label.
    pub comparison: bool,
    /// Recent transcripts found before the session cap was applied.
    pub candidates_found: usize,
    /// Sessions with at least one bundle read.
    pub sessions: Vec<SessionLine>,
    pub groups: Vec<GroupSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}
