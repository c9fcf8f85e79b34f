//! Transcript intake: the session log is JSONL, one event per line, written
//! append-only by the host runtime. Events mix plain dialogue with tool-call
//! records, and `message.content` can be a bare string or a list of typed
//! blocks. Unparsable lines are skipped, never fatal.

use serde_json::Value;
use std::io::Read;
use std::path::Path;

const MAX_TOOL_DESC_CHARS: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Host-generated rollup of earlier conversation.
    Summary(String),
    /// A plain dialogue turn (text blocks only, tool plumbing excluded).
    Turn { role: Role, text: String },
    /// A tool invocation: name plus whatever description/prompt the input
    /// carried, truncated.
    ToolUse { name: String, description: String },
    /// Output returned by a tool, flattened to text.
    ToolResult { text: String },
}

/// Last `max_lines` lines of the transcript file. The transcript is
/// append-only and can be large; only the tail is relevant.
pub fn tail_lines(path: &Path, max_lines: usize) -> std::io::Result<Vec<String>> {
    let mut raw = String::new();
    std::fs::File::open(path)?.read_to_string(&mut raw)?;
    let lines: Vec<&str> = raw.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    Ok(lines[start..].iter().map(|s| s.to_string()).collect())
}

/// Parse JSONL lines into events. One line can yield several events (an
/// assistant turn often carries text and tool_use blocks together). Lines
/// that are blank or fail to parse are dropped.
pub fn parse_transcript_lines(lines: &[String]) -> Vec<TranscriptEvent> {
    let mut events = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => parse_event(&value, &mut events),
            Err(err) => log::debug!("skipping unparsable transcript line: {err}"),
        }
    }
    events
}

fn parse_event(value: &Value, events: &mut Vec<TranscriptEvent>) {
    let kind = value.get("type").and_then(Value::as_str).unwrap_or("");

    if kind == "summary" {
        if let Some(text) = value.get("summary").and_then(Value::as_str) {
            let text = text.trim();
            if !text.is_empty() {
                events.push(TranscriptEvent::Summary(text.to_string()));
            }
        }
        return;
    }

    if kind == "user" || kind == "assistant" {
        let role = if kind == "user" {
            Role::User
        } else {
            Role::Assistant
        };
        if let Some(message) = value.get("message") {
            parse_message(role, message, events);
        }
    }

    // Top-level toolUseResult objects carry the output of delegated work.
    if let Some(result) = value.get("toolUseResult") {
        let mut text = Vec::new();
        collect_text(result.get("content").unwrap_or(&Value::Null), &mut text);
        let text = text.join("\n");
        if !text.trim().is_empty() {
            events.push(TranscriptEvent::ToolResult { text });
        }
    }
}

fn parse_message(role: Role, message: &Value, events: &mut Vec<TranscriptEvent>) {
    let content = message.get("content").unwrap_or(&Value::Null);

    // Bare-string content is a plain turn.
    if let Some(text) = content.as_str() {
        push_turn(role, text, events);
        return;
    }

    let Some(blocks) = content.as_array() else {
        return;
    };

    let mut turn_text = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    let text = text.trim();
                    if !text.is_empty() {
                        turn_text.push(text.to_string());
                    }
                }
            }
            Some("tool_use") => {
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let input = block.get("input");
                let description = input
                    .and_then(|i| i.get("description").and_then(Value::as_str))
                    .or_else(|| input.and_then(|i| i.get("prompt").and_then(Value::as_str)))
                    .unwrap_or("")
                    .trim()
                    .replace('\r', "");
                events.push(TranscriptEvent::ToolUse {
                    name,
                    description: truncate_chars(&description, MAX_TOOL_DESC_CHARS),
                });
            }
            Some("tool_result") => {
                let mut text = Vec::new();
                collect_text(block.get("content").unwrap_or(&Value::Null), &mut text);
                let text = text.join("\n");
                if !text.trim().is_empty() {
                    events.push(TranscriptEvent::ToolResult { text });
                }
            }
            _ => {}
        }
    }

    if !turn_text.is_empty() {
        push_turn(role, &turn_text.join("\n"), events);
    }
}

fn push_turn(role: Role, text: &str, events: &mut Vec<TranscriptEvent>) {
    let text = text.trim();
    if !text.is_empty() {
        events.push(TranscriptEvent::Turn {
            role,
            text: text.to_string(),
        });
    }
}

/// Recursively collect text out of arbitrarily nested content: strings,
/// lists, `{type:"text"}` blocks, and `content`/`message` containers.
fn collect_text(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_text(item, out);
            }
        }
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("text") {
                if let Some(Value::String(s)) = map.get("text") {
                    let s = s.trim();
                    if !s.is_empty() {
                        out.push(s.to_string());
                    }
                }
            }
            if let Some(content) = map.get("content") {
                collect_text(content, out);
            }
            if let Some(message) = map.get("message") {
                collect_text(message, out);
            }
        }
        _ => {}
    }
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
