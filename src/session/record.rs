//! Lenient models of one transcript line.
//!
//! The transcript format belongs to the assistant runtime, so only the
//! handful of fields the analyzer needs are modelled and every one of them
//! is optional. Content items are decoded one at a time; an item of an
//! unexpected shape is ignored instead of failing the whole record.

use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

/// Tool name of a file-read invocation.
pub const READ_TOOL: &str = "Read";

/// One JSON object per transcript line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptRecord {
    #[serde(default, rename = "type")]
    pub record_type: Option<String>,
    #[serde(default)]
    pub message: Option<RecordMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: MessageContent,
}

/// `message.content` is plain text for typed user turns and a list of
/// blocks for assistant turns and tool results.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Items(Vec<Value>),
    Other(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Other(Value::Null)
    }
}

/// A `tool_use` content block.
#[derive(Debug, Clone, Deserialize)]
struct ToolUse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    input: Option<ToolInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ToolInput {
    #[serde(default)]
    file_path: Option<String>,
}

impl TranscriptRecord {
    /// Parse a single line. Malformed lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                trace!("Skipping malformed transcript line: {}", e);
                None
            }
        }
    }

    pub fn is_user(&self) -> bool {
        self.record_type.as_deref() == Some("user")
    }

    pub fn is_assistant(&self) -> bool {
        match self.message.as_ref().and_then(|m| m.role.as_deref()) {
            Some(role) => role == "assistant",
            None => self.record_type.as_deref() == Some("assistant"),
        }
    }

    /// Free text of a user turn. Tool results (block lists) are not user text.
    pub fn user_text(&self) -> Option<&str> {
        if !self.is_user() {
            return None;
        }
        match self.message.as_ref().map(|m| &m.content) {
            Some(MessageContent::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Target paths of every file-read invocation in an assistant turn, in order.
    pub fn read_paths(&self) -> Vec<String> {
        if !self.is_assistant() {
            return Vec::new();
        }
        let items = match self.message.as_ref().map(|m| &m.content) {
            Some(MessageContent::Items(items)) => items,
            _ => return Vec::new(),
        };

        items
            .iter()
            .filter_map(|item| serde_json::from_value::<ToolUse>(item.clone()).ok())
            .filter(|tool| tool.kind == "tool_use" && tool.name == READ_TOOL)
            .filter_map(|tool| tool.input.and_then(|input| input.file_path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_text() {
        let record = TranscriptRecord::parse(
            r#"{"type":"user","message":{"role":"user","content":"Show me all my VMs"}}"#,
        )
        .unwrap();
        assert!(record.is_user());
        assert!(!record.is_assistant());
        assert_eq!(record.user_text(), Some("Show me all my VMs"));
    }

    #[test]
    fn test_tool_result_is_not_user_text() {
        let record = TranscriptRecord::parse(
            r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","content":"ok"}]}}"#,
        )
        .unwrap();
        assert!(record.is_user());
        assert_eq!(record.user_text(), None);
    }

    #[test]
    fn test_read_paths_skips_other_items() {
        let line = r#"{"type":"assistant","message":{"role":"assistant","content":[
            "stray string",
            {"type":"text","text":"Let me look"},
            {"type":"tool_use","name":"Read","input":{"file_path":"/a/SKILL.md"}},
            {"type":"tool_use","name":"Bash","input":{"command":"ls"}},
            {"type":"tool_use","name":"Read","input":{"file_path":42}},
            {"type":"tool_use","name":"Read","input":{"file_path":"/a/references/x.md"}}
        ]}}"#
            .replace('\n', "");
        let record = TranscriptRecord::parse(&line).unwrap();
        assert!(record.is_assistant());
        assert_eq!(
            record.read_paths(),
            vec!["/a/SKILL.md".to_string(), "/a/references/x.md".to_string()]
        );
    }

    #[test]
    fn test_role_wins_over_type() {
        let record = TranscriptRecord::parse(
            r#"{"type":"progress","message":{"role":"assistant","content":[]}}"#,
        )
        .unwrap();
        assert!(record.is_assistant());

        let record = TranscriptRecord::parse(r#"{"type":"assistant"}"#).unwrap();
        assert!(record.is_assistant());
        assert!(record.read_paths().is_empty());
    }

    #[test]
    fn test_malformed_lines() {
        assert!(TranscriptRecord::parse("").is_none());
        assert!(TranscriptRecord::parse("   ").is_none());
        assert!(TranscriptRecord::parse("{not json").is_none());
        assert!(TranscriptRecord::parse("42").is_none());
        assert!(TranscriptRecord::parse(r#"{"type":"user","message":"flat"}"#).is_none());
    }
}
