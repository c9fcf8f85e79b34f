//! Transcript window selection: a bounded, relevance-filtered slice of the
//! session that starts at the user's goal statement and ends with confirmed
//! fix evidence. False positives in inclusion are acceptable; dropping the
//! actual fix is not.

use crate::transcript::{truncate_chars, Role, TranscriptEvent};
use crate::{ArchiveError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const DEFAULT_MAX_LINES: usize = 8000;

const MAX_SUMMARIES: usize = 80;
const MAX_TOOL_CALLS: usize = 120;
const MAX_TOOL_OUTPUTS: usize = 120;
const MAX_TURNS: usize = 120;
const MAX_TOOL_OUTPUT_CHARS: usize = 20_000;
const MAX_EVIDENCE_CHARS: usize = 160;
pub(crate) const MAX_MATERIAL_CHARS: usize = 60_000;

/// Markers that a fix was actually confirmed: test runners, health checks,
/// clean exits, explicit confirmations. Matched case-insensitively against
/// tool output and assistant turns inside the window.
static SUCCESS_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)test result: ok",
        r"(?i)\ball tests? pass(ed)?\b",
        r"(?i)\b\d+ pass(ed|ing)\b.*\b0 fail",
        r"(?i)build (succeeded|successful|finished successfully)",
        r"(?i)compiled successfully",
        r"(?i)exit(ed)? (code|status)[: ]+0\b",
        r"(?i)cluster_state:ok",
        r"(?i)\[ok\]",
        r"(?i)\ball \d+ slots covered\b",
        r"(?i)\bpong\b",
        r"(?i)(fix|issue|problem|error) (is )?(confirmed|verified|resolved|fixed|gone)\b",
        r"(?i)\bworks now\b",
        r"(?i)server (is )?(up|running|healthy)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("success marker regex"))
    .collect()
});

/// A goal statement is a substantive user turn, not a bare slash command and
/// not tool plumbing.
fn looks_like_goal(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && !text.starts_with('/') && text.chars().count() >= 8
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DialogueTurn {
    pub role: &'static str,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub description: String,
}

/// The compact bundle handed to the synthesizer, never raw transcript text.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TranscriptWindow {
    pub goal: String,
    pub summaries: Vec<String>,
    pub key_turns: Vec<DialogueTurn>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_outputs: Vec<String>,
    pub fix_evidence: Vec<String>,
}

/// Select the archivable window from parsed events.
///
/// Locates the earliest goal statement in the retained window, keeps the
/// dialogue and tool activity from there on, and collects success evidence.
/// Refuses with `TranscriptUnavailable` when the window is empty, has no
/// goal, or carries no confirmed fix; the pipeline must not synthesize
/// speculative content.
pub fn select_window(events: &[TranscriptEvent]) -> Result<TranscriptWindow> {
    if events.is_empty() {
        return Err(ArchiveError::TranscriptUnavailable(
            "transcript window is empty".to_string(),
        ));
    }

    let goal_pos = events.iter().position(|e| {
        matches!(e, TranscriptEvent::Turn { role: Role::User, text } if looks_like_goal(text))
    });
    let Some(goal_pos) = goal_pos else {
        return Err(ArchiveError::TranscriptUnavailable(
            "no user goal statement in the retained window".to_string(),
        ));
    };
    let goal = match &events[goal_pos] {
        TranscriptEvent::Turn { text, .. } => text.clone(),
        _ => unreachable!("goal position always indexes a turn"),
    };

    // Summaries describe context from before the window; keep them wherever
    // they appear. Everything else before the goal is pre-goal exploration.
    let mut summaries = Vec::new();
    let mut key_turns = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_outputs = Vec::new();
    let mut fix_evidence = Vec::new();

    for (pos, event) in events.iter().enumerate() {
        match event {
            TranscriptEvent::Summary(text) => summaries.push(text.clone()),
            _ if pos < goal_pos => {}
            TranscriptEvent::Turn { role, text } => {
                if *role == Role::Assistant {
                    collect_evidence(text, &mut fix_evidence);
                }
                key_turns.push(DialogueTurn {
                    role: role.as_str(),
                    text: text.clone(),
                });
            }
            TranscriptEvent::ToolUse { name, description } => {
                tool_calls.push(ToolCall {
                    name: name.clone(),
                    description: description.clone(),
                });
            }
            TranscriptEvent::ToolResult { text } => {
                collect_evidence(text, &mut fix_evidence);
                tool_outputs.push(truncate_chars(text, MAX_TOOL_OUTPUT_CHARS));
            }
        }
    }

    if fix_evidence.is_empty() {
        return Err(ArchiveError::TranscriptUnavailable(
            "no confirmed fix evidence in the retained window".to_string(),
        ));
    }

    keep_tail(&mut summaries, MAX_SUMMARIES);
    keep_tail(&mut key_turns, MAX_TURNS);
    keep_tail(&mut tool_calls, MAX_TOOL_CALLS);
    keep_tail(&mut tool_outputs, MAX_TOOL_OUTPUTS);

    Ok(TranscriptWindow {
        goal,
        summaries,
        key_turns,
        tool_calls,
        tool_outputs,
        fix_evidence,
    })
}

fn collect_evidence(text: &str, evidence: &mut Vec<String>) {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if SUCCESS_MARKERS.iter().any(|m| m.is_match(line)) {
            let entry = truncate_chars(line, MAX_EVIDENCE_CHARS);
            if !evidence.contains(&entry) {
                evidence.push(entry);
            }
        }
    }
}

fn keep_tail<T>(items: &mut Vec<T>, max: usize) {
    if items.len() > max {
        items.drain(..items.len() - max);
    }
}

impl TranscriptWindow {
    /// Render the window as the oracle's input material. Sections mirror the
    /// selector's buckets; the whole blob is tail-truncated to keep the most
    /// recent turns when over budget.
    pub fn render_material(&self) -> String {
        let mut sections = Vec::new();

        sections.push(format!("## Stated goal\n{}", self.goal));

        if !self.summaries.is_empty() {
            let mut s = String::from("## Session summaries\n");
            for item in &self.summaries {
                s.push_str(&format!("- {item}\n"));
            }
            sections.push(s);
        }

        if !self.tool_calls.is_empty() {
            let mut s = String::from("## Tool invocations\n");
            for call in &self.tool_calls {
                s.push_str(&format!("- {}: {}\n", call.name, call.description));
            }
            sections.push(s);
        }

        if !self.tool_outputs.is_empty() {
            let mut s = String::from("## Tool output (key excerpts)\n");
            for output in &self.tool_outputs {
                s.push_str(output);
                s.push_str("\n---\n");
            }
            sections.push(s);
        }

        if !self.key_turns.is_empty() {
            let mut s = String::from("## Dialogue\n");
            for turn in &self.key_turns {
                s.push_str(&format!("{}: {}\n", turn.role, turn.text));
            }
            sections.push(s);
        }

        let mut s = String::from("## Success evidence\n");
        for item in &self.fix_evidence {
            s.push_str(&format!("- {item}\n"));
        }
        sections.push(s);

        let blob = sections.join("\n");
        let total = blob.chars().count();
        if total > MAX_MATERIAL_CHARS {
            blob.chars().skip(total - MAX_MATERIAL_CHARS).collect()
        } else {
            blob
        }
    }
}
