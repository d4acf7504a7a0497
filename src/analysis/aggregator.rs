//! Session aggregation and the comparative verdict.
//!
//! Sessions are grouped by variant label, each group is summarized, and
//! when two or more groups have data their reads-per-query ratios are
//! compared.

use crate::models::{Efficiency, GroupRatio, GroupSummary, SessionResult, Verdict};
use std::collections::BTreeSet;
use tracing::debug;

/// Split results into one group per label, preserving label order.
///
/// Results whose version is not one of `labels` belong to no group.
pub fn group_by_version(
    results: Vec<SessionResult>,
    labels: &[String],
) -> Vec<(String, Vec<SessionResult>)> {
    let mut groups: Vec<(String, Vec<SessionResult>)> =
        labels.iter().map(|l| (l.clone(), Vec::new())).collect();

    for result in results {
        let slot = result.version.as_deref().and_then(|version| {
            groups
                .iter_mut()
                .find(|group| group.0.eq_ignore_ascii_case(version))
        });
        match slot {
            Some((_, members)) => members.push(result),
            None => debug!(
                "Session {} has version {}, not in any group",
                result.path.display(),
                result.version_label()
            ),
        }
    }

    groups
}

/// Summarize one group of sessions.
pub fn summarize_group(label: &str, results: &[SessionResult]) -> GroupSummary {
    let total_reads: usize = results.iter().map(|r| r.total_reads).sum();
    let total_queries: usize = results.iter().map(|r| r.queries.len()).sum();
    let unique_files: BTreeSet<String> = results
        .iter()
        .flat_map(|r| r.skill_reads.iter().cloned())
        .collect();

    let avg_reads_per_query = if total_queries > 0 {
        Some(total_reads as f64 / total_queries as f64)
    } else {
        None
    };

    GroupSummary {
        label: label.to_string(),
        sessions: results.len(),
        total_queries,
        total_reads,
        primary_reads: results.iter().map(|r| r.primary_reads).sum(),
        reference_reads: results.iter().map(|r| r.reference_reads).sum(),
        unique_files,
        avg_reads_per_query,
    }
}

/// Summarize every group, then compare those with data.
pub fn aggregate(groups: &[(String, Vec<SessionResult>)]) -> (Vec<GroupSummary>, Option<Verdict>) {
    let summaries: Vec<GroupSummary> = groups
        .iter()
        .map(|(label, results)| summarize_group(label, results))
        .collect();
    let verdict = compute_verdict(&summaries);
    (summaries, verdict)
}

/// Reads per query, counting a group with no matched queries as one query.
pub fn reads_per_query(summary: &GroupSummary) -> f64 {
    summary.total_reads as f64 / summary.total_queries.max(1) as f64
}

/// Compare groups with data. Needs at least two of them.
///
/// Ties go to the group that comes first in `summaries`.
pub fn compute_verdict(summaries: &[GroupSummary]) -> Option<Verdict> {
    let ranked: Vec<(&str, f64)> = summaries
        .iter()
        .filter(|s| s.has_data())
        .map(|s| (s.label.as_str(), reads_per_query(s)))
        .collect();

    if ranked.len() < 2 {
        return None;
    }

    let mut best = ranked[0];
    let mut worst = ranked[0];
    for &entry in &ranked[1..] {
        if entry.1 < best.1 {
            best = entry;
        }
        if entry.1 > worst.1 {
            worst = entry;
        }
    }

    let factor = if best.1 == 0.0 {
        Efficiency::Unbounded
    } else {
        Efficiency::Finite(worst.1 / best.1)
    };

    let mut ratios: Vec<GroupRatio> = ranked
        .iter()
        .map(|(label, ratio)| GroupRatio {
            label: label.to_string(),
            reads_per_query: *ratio,
        })
        .collect();
    ratios.sort_by(|a, b| a.label.cmp(&b.label));

    Some(Verdict {
        ratios,
        most_efficient: best.0.to_string(),
        least_efficient: worst.0.to_string(),
        factor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn session(version: &str, queries: usize, reads: &[&str]) -> SessionResult {
        let mut result = SessionResult::new(PathBuf::from(format!("{version}.jsonl")));
        result.version = Some(version.to_string());
        result.queries = (0..queries).map(|i| format!("Q{}", i + 1)).collect();
        for read in reads {
            let kind = if *read == "SKILL.md" {
                crate::models::ReadKind::Primary
            } else {
                crate::models::ReadKind::Reference
            };
            result.record_read(read.to_string(), kind);
        }
        result
    }

    fn summary(label: &str, sessions: usize, queries: usize, reads: usize) -> GroupSummary {
        GroupSummary {
            label: label.to_string(),
            sessions,
            total_queries: queries,
            total_reads: reads,
            ..GroupSummary::default()
        }
    }

    #[test]
    fn test_group_by_version() {
        let labels = vec!["v1".to_string(), "v2".to_string(), "v3".to_string()];
        let mut unknown = session("v2", 1, &["SKILL.md"]);
        unknown.version = None;

        let groups = group_by_version(
            vec![
                session("v2", 1, &["SKILL.md"]),
                session("V1", 1, &["SKILL.md"]),
                unknown,
                session("v2", 2, &["SKILL.md"]),
            ],
            &labels,
        );

        let sizes: Vec<_> = groups.iter().map(|(l, r)| (l.as_str(), r.len())).collect();
        assert_eq!(sizes, vec![("v1", 1), ("v2", 2), ("v3", 0)]);
    }

    #[test]
    fn test_summarize_group() {
        let results = vec![
            session("v2", 2, &["SKILL.md", "references/a.md"]),
            session("v2", 1, &["SKILL.md", "references/b.md", "references/a.md"]),
        ];
        let summary = summarize_group("v2", &results);

        assert_eq!(summary.sessions, 2);
        assert_eq!(summary.total_queries, 3);
        assert_eq!(summary.total_reads, 5);
        assert_eq!(summary.primary_reads, 2);
        assert_eq!(summary.reference_reads, 3);
        assert_eq!(summary.unique_files.len(), 3);
        let avg = summary.avg_reads_per_query.unwrap();
        assert!((avg - 5.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_group_has_no_data() {
        let summary = summarize_group("v3", &[]);
        assert!(!summary.has_data());
        assert_eq!(summary.avg_reads_per_query, None);
    }

    #[test]
    fn test_no_queries_means_no_average() {
        let summary = summarize_group("v1", &[session("v1", 0, &["SKILL.md"])]);
        assert!(summary.has_data());
        assert_eq!(summary.avg_reads_per_query, None);
        assert_eq!(reads_per_query(&summary), 1.0);
    }

    #[test]
    fn test_verdict_ratio_of_ratios() {
        let verdict =
            compute_verdict(&[summary("X", 2, 5, 10), summary("Y", 3, 5, 30)]).unwrap();

        assert_eq!(verdict.most_efficient, "X");
        assert_eq!(verdict.least_efficient, "Y");
        assert_eq!(verdict.ratios[0].reads_per_query, 2.0);
        assert_eq!(verdict.ratios[1].reads_per_query, 6.0);
        assert_eq!(verdict.factor, Efficiency::Finite(3.0));
    }

    #[test]
    fn test_verdict_needs_two_groups_with_data() {
        assert!(compute_verdict(&[summary("v1", 1, 1, 4), summary("v2", 0, 0, 0)]).is_none());
        assert!(compute_verdict(&[summary("v1", 1, 1, 4)]).is_none());
    }

    #[test]
    fn test_verdict_unbounded_when_best_is_zero() {
        let verdict =
            compute_verdict(&[summary("v1", 1, 2, 0), summary("v2", 1, 2, 4)]).unwrap();
        assert_eq!(verdict.most_efficient, "v1");
        assert_eq!(verdict.factor, Efficiency::Unbounded);
    }

    #[test]
    fn test_verdict_ratios_sorted_by_label_and_ties_go_first() {
        let verdict = compute_verdict(&[
            summary("v3", 1, 2, 4),
            summary("v1", 1, 1, 2),
            summary("v2", 1, 1, 9),
        ])
        .unwrap();

        let labels: Vec<_> = verdict.ratios.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["v1", "v2", "v3"]);
        assert_eq!(verdict.most_efficient, "v3");
        assert_eq!(verdict.least_efficient, "v2");
        assert_eq!(verdict.factor, Efficiency::Finite(4.5));
    }

    #[test]
    fn test_aggregate() {
        let groups = vec![
            ("v1".to_string(), vec![session("v1", 5, &["SKILL.md"; 10])]),
            ("v2".to_string(), vec![]),
        ];
        let (summaries, verdict) = aggregate(&groups);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].avg_reads_per_query, Some(2.0));
        assert!(!summaries[1].has_data());
        assert!(verdict.is_none());
    }
}
