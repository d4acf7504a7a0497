//! Report rendering.
//!
//! The console format mirrors what an operator reads after a test run;
//! markdown is the same content for pasting into notes, and JSON is the
//! serialized `AnalysisReport`.

use crate::models::{AnalysisReport, GroupSummary, SessionLine, TestQuery, Verdict};
use anyhow::Result;

const RULE: &str = "============================================================";

/// Render the console report.
pub fn generate_text_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("\n{}\nANALYZING RECENT SESSIONS\n{}\n", RULE, RULE));

    if let Some(message) = empty_state(report) {
        output.push_str(message);
        output.push('\n');
        return output;
    }

    output.push_str(&format!(
        "\nFound {} recent sessions (last {}h), {} with skill reads:\n\n",
        report.candidates_found,
        report.window_hours,
        report.sessions.len()
    ));
    for session in &report.sessions {
        output.push_str(&format!("  {}\n", session_line(session, report.comparison)));
    }

    let title = if report.comparison {
        "COMPARISON SUMMARY"
    } else {
        "SUMMARY"
    };
    output.push_str(&format!("\n{}\n{}\n{}\n", RULE, title, RULE));
    for group in &report.groups {
        output.push_str(&text_group_section(group));
    }

    if let Some(verdict) = &report.verdict {
        output.push_str(&format!("\n{}\nVERDICT\n{}\n", RULE, RULE));
        for ratio in &verdict.ratios {
            output.push_str(&format!(
                "  {} avg reads/query: {:.2}\n",
                ratio.label.to_uppercase(),
                ratio.reads_per_query
            ));
        }
        output.push('\n');
        output.push_str(&format!("  {}\n", verdict_sentence(verdict)));
        output.push_str(&format!(
            "  Most efficient: {}\n",
            verdict.most_efficient.to_uppercase()
        ));
    }

    output
}

/// Render the report as Markdown.
pub fn generate_markdown_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str("# Skill Read Analysis\n\n");
    output.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    output.push_str(&format!("- **Window:** last {}h\n", report.window_hours));
    output.push_str(&format!(
        "- **Mode:** {}\n\n",
        if report.comparison {
            "variant comparison"
        } else {
            "single bundle"
        }
    ));

    if let Some(message) = empty_state(report) {
        output.push_str(message);
        output.push('\n');
        return output;
    }

    output.push_str("## Sessions\n\n");
    if report.comparison {
        output.push_str("| Time | Version | Reads | Queries |\n");
        output.push_str("|:---|:---:|:---:|:---|\n");
    } else {
        output.push_str("| Time | Reads | Queries |\n");
        output.push_str("|:---|:---:|:---|\n");
    }
    for session in &report.sessions {
        let time = session.modified.format("%H:%M:%S");
        let queries = session.queries.join(", ");
        if report.comparison {
            output.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                time,
                version_column(session),
                session.total_reads,
                queries
            ));
        } else {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                time, session.total_reads, queries
            ));
        }
    }
    output.push('\n');

    output.push_str("## Summary\n\n");
    for group in &report.groups {
        output.push_str(&format!("### {}\n\n", group.label.to_uppercase()));
        if !group.has_data() {
            output.push_str("No data\n\n");
            continue;
        }
        output.push_str("| Metric | Value |\n|:---|:---:|\n");
        output.push_str(&format!("| Sessions analyzed | {} |\n", group.sessions));
        output.push_str(&format!("| Test queries matched | {} |\n", group.total_queries));
        output.push_str(&format!("| Total skill reads | {} |\n", group.total_reads));
        output.push_str(&format!("| Primary reads | {} |\n", group.primary_reads));
        output.push_str(&format!("| Reference reads | {} |\n", group.reference_reads));
        if let Some(avg) = group.avg_reads_per_query {
            output.push_str(&format!("| Avg reads per query | {:.2} |\n", avg));
        }
        output.push('\n');

        output.push_str(&format!(
            "**Unique files accessed ({}):**\n\n",
            group.unique_files.len()
        ));
        for file in &group.unique_files {
            output.push_str(&format!("- `{}`\n", file));
        }
        output.push('\n');
    }

    if let Some(verdict) = &report.verdict {
        output.push_str("## Verdict\n\n");
        output.push_str("| Version | Avg reads/query |\n|:---|:---:|\n");
        for ratio in &verdict.ratios {
            output.push_str(&format!(
                "| {} | {:.2} |\n",
                ratio.label.to_uppercase(),
                ratio.reads_per_query
            ));
        }
        output.push('\n');
        output.push_str(&format!("{}\n\n", verdict_sentence(verdict)));
        output.push_str(&format!(
            "**Most efficient:** {}\n",
            verdict.most_efficient.to_uppercase()
        ));
    }

    output
}

/// Serialize the report as pretty JSON.
pub fn generate_json_report(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render the query list for copy/paste.
pub fn format_query_list(queries: &[TestQuery]) -> String {
    let mut output = format!("\n{}\nTEST QUERIES\n{}\n", RULE, RULE);
    for query in queries {
        output.push_str(&format!("\n{} ({}):\n  {}\n", query.id, query.tier, query.text));
    }
    output
}

/// `HH:MM:SS | LABEL | NN reads | queries: [..]`; the label column is
/// dropped outside comparison mode.
pub fn session_line(session: &SessionLine, comparison: bool) -> String {
    let time = session.modified.format("%H:%M:%S");
    let queries = format!("[{}]", session.queries.join(", "));
    if comparison {
        format!(
            "{} | {:<3} | {:>2} reads | queries: {}",
            time,
            version_column(session),
            session.total_reads,
            queries
        )
    } else {
        format!(
            "{} | {:>2} reads | queries: {}",
            time, session.total_reads, queries
        )
    }
}

fn version_column(session: &SessionLine) -> String {
    session
        .version
        .as_deref()
        .unwrap_or("unknown")
        .to_uppercase()
}

fn text_group_section(group: &GroupSummary) -> String {
    let label = group.label.to_uppercase();
    if !group.has_data() {
        return format!("\n{}: No data\n", label);
    }

    let mut section = format!("\n{}:\n", label);
    section.push_str(&format!("  Sessions analyzed: {}\n", group.sessions));
    section.push_str(&format!("  Test queries matched: {}\n", group.total_queries));
    section.push_str(&format!("  Total skill reads: {}\n", group.total_reads));
    section.push_str(&format!("    - Primary doc: {}\n", group.primary_reads));
    section.push_str(&format!("    - Reference files: {}\n", group.reference_reads));
    if let Some(avg) = group.avg_reads_per_query {
        section.push_str(&format!("  Avg reads per query: {:.2}\n", avg));
    }
    section.push_str(&format!(
        "  Unique files accessed: {}\n",
        group.unique_files.len()
    ));
    for file in &group.unique_files {
        section.push_str(&format!("    - {}\n", file));
    }
    section
}

fn verdict_sentence(verdict: &Verdict) -> String {
    format!(
        "{} uses {} FEWER tool calls than {}",
        verdict.most_efficient.to_uppercase(),
        verdict.factor,
        verdict.least_efficient.to_uppercase()
    )
}

fn empty_state(report: &AnalysisReport) -> Option<&'static str> {
    if report.candidates_found == 0 {
        Some("No recent sessions found. Run some tests first!")
    } else if report.sessions.is_empty() {
        Some("No sessions with skill reads found.")
    } else {
        None
    }
}
