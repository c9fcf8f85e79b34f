//! The archival pipeline. Ordering matters: the oracle call is slow and
//! network-bound, so it completes before the merge lock is taken; every
//! failure path aborts before any file write.

use crate::oracle::{Oracle, SynthesisRequest};
use crate::signature::normalize;
use crate::transcript::{parse_transcript_lines, tail_lines};
use crate::window::{select_window, DEFAULT_MAX_LINES};
use crate::{ArchiveError, Result};
use recall_store::{merge_archive, KnowledgeStore, MergeOutcome};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    pub project_root: PathBuf,
    pub transcript_path: PathBuf,
    /// Tail budget over the transcript file; caps memory and token cost.
    pub max_lines: usize,
}

impl ArchiveRequest {
    pub fn new(project_root: impl Into<PathBuf>, transcript_path: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            transcript_path: transcript_path.into(),
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveReport {
    pub outcome: MergeOutcome,
    pub context_dir: PathBuf,
}

impl ArchiveReport {
    /// One-line human summary for the trigger hook to surface.
    pub fn summary(&self) -> String {
        let action = if self.outcome.created {
            "archived new resolution"
        } else if self.outcome.superseded {
            "superseded fix on"
        } else {
            "refined"
        };
        format!(
            "{action} {} (+{} facts, +{} anti-patterns, +{} checks) in {}",
            self.outcome.resolution_id,
            self.outcome.facts_added,
            self.outcome.anti_patterns_added,
            self.outcome.verification_added,
            self.context_dir.display()
        )
    }
}

/// Run one archival: tail the transcript, select the window, synthesize,
/// validate, and merge under the project lock.
pub async fn archive(request: &ArchiveRequest, oracle: &dyn Oracle) -> Result<ArchiveReport> {
    let lines = match tail_lines(&request.transcript_path, request.max_lines) {
        Ok(lines) => lines,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArchiveError::TranscriptUnavailable(format!(
                "transcript not found: {}",
                request.transcript_path.display()
            )))
        }
        Err(err) => return Err(err.into()),
    };

    let events = parse_transcript_lines(&lines);
    let window = select_window(&events)?;
    log::info!(
        "selected window: {} turns, {} tool calls, {} evidence lines",
        window.key_turns.len(),
        window.tool_calls.len(),
        window.fix_evidence.len()
    );

    let store = KnowledgeStore::for_project_root(&request.project_root);
    let current_index = store.load_index()?;

    let output = oracle
        .synthesize(SynthesisRequest {
            window: &window,
            current_index: current_index.as_ref(),
        })
        .await?;

    let missing = output.resolution.missing_fields();
    if !missing.is_empty() {
        return Err(ArchiveError::SchemaViolation(format!(
            "draft missing required fields: {}",
            missing.join(", ")
        )));
    }

    let signature = normalize(&output.resolution.problem);
    if signature.is_empty() {
        return Err(ArchiveError::SchemaViolation(
            "draft problem text normalizes to an empty signature".to_string(),
        ));
    }

    let outcome = merge_archive(&store, output.resolution, signature, output.index_delta)?;

    Ok(ArchiveReport {
        context_dir: store.context_dir(),
        outcome,
    })
}
