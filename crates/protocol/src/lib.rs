use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub mod retrieval;

pub use retrieval::{ErrorEnvelope, RetrievalErrorKind, RetrievalRequest};

pub const INDEX_SCHEMA_VERSION: u32 = 1;

/// Per-project summary record: current goal/status, accumulated facts, and a
/// back-reference catalog of archived resolutions. One `index.json` per
/// project; the index owns the resolution references, not the other way
/// around.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ContextIndex {
    pub schema_version: u32,
    pub project: String,
    pub current_goal: String,
    pub project_status: String,
    /// Append-only, deduplicated by exact text. The only field that never
    /// shrinks.
    pub verified_facts: Vec<String>,
    /// Replaced wholesale on each archival; represents "what's next" as of now.
    pub next_actions: Vec<String>,
    pub resolutions: Vec<ResolutionRef>,
}

impl ContextIndex {
    pub fn new() -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION,
            project: "unknown".to_string(),
            current_goal: String::new(),
            project_status: String::new(),
            verified_facts: Vec::new(),
            next_actions: Vec::new(),
            resolutions: Vec::new(),
        }
    }

    pub fn resolution_ids(&self) -> Vec<&str> {
        self.resolutions.iter().map(|r| r.id.as_str()).collect()
    }
}

impl Default for ContextIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight catalog entry pointing at a persisted resolution file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ResolutionRef {
    pub id: String,
    pub problem_signature: String,
    pub short_title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub artifacts_touched: Vec<String>,
}

/// Success judgements backing a resolution: key log fragments and, when the
/// transcript carried one, a timestamp.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default, JsonSchema)]
pub struct Evidence {
    #[serde(default)]
    pub signals: Vec<String>,
    #[serde(default)]
    pub when: Option<String>,
}

/// One confirmed problem→fix episode. Persisted as
/// `resolutions/res-NNN.json`; append-refined only after that. `final_fix`
/// and `root_cause` are replaced only by an explicitly superseding merge, and
/// the displaced fix is kept in `supplements`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct Resolution {
    pub id: String,
    pub problem: String,
    pub root_cause: String,
    pub final_fix: Vec<String>,
    #[serde(default)]
    pub why_it_works: Option<String>,
    pub verification: Vec<String>,
    pub anti_patterns: Vec<String>,
    /// Alternative or superseded fixes, recorded without overwriting history.
    #[serde(default)]
    pub supplements: Vec<String>,
    #[serde(default)]
    pub artifacts_touched: Vec<String>,
    #[serde(default)]
    pub evidence: Evidence,
    pub problem_signature: String,
}

/// What the synthesis oracle returns for one episode. It carries no `id`
/// (identifier allocation belongs to the merge engine) and no
/// `problem_signature` (that is always recomputed locally from `problem`).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ResolutionDraft {
    pub problem: String,
    pub root_cause: String,
    pub final_fix: Vec<String>,
    #[serde(default)]
    pub why_it_works: Option<String>,
    #[serde(default)]
    pub verification: Vec<String>,
    #[serde(default)]
    pub anti_patterns: Vec<String>,
    #[serde(default)]
    pub artifacts_touched: Vec<String>,
    #[serde(default)]
    pub evidence: Evidence,
    /// One-line summary used for the index back-reference.
    pub short_title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// True only when the oracle judged the new episode to correct the prior
    /// fix for the same signature. The merge engine never infers this from
    /// free text.
    #[serde(default)]
    pub supersedes_prior_fix: bool,
}

impl ResolutionDraft {
    /// Required fields that are missing or empty. An empty return means the
    /// draft is structurally sound.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.problem.trim().is_empty() {
            missing.push("problem");
        }
        if self.root_cause.trim().is_empty() {
            missing.push("root_cause");
        }
        if self.final_fix.iter().all(|s| s.trim().is_empty()) {
            missing.push("final_fix");
        }
        if self.short_title.trim().is_empty() {
            missing.push("short_title");
        }
        missing
    }

    /// Render the draft's fix as a single supplementary note, for merges that
    /// keep the existing fix authoritative.
    pub fn fix_as_note(&self) -> String {
        let steps = self.final_fix.join("; ");
        match &self.why_it_works {
            Some(why) if !why.trim().is_empty() => {
                format!("alternative fix: {steps} ({why})")
            }
            _ => format!("alternative fix: {steps}"),
        }
    }

    pub fn into_resolution(self, id: String, problem_signature: String) -> Resolution {
        Resolution {
            id,
            problem: self.problem,
            root_cause: self.root_cause,
            final_fix: self.final_fix,
            why_it_works: self.why_it_works,
            verification: self.verification,
            anti_patterns: self.anti_patterns,
            supplements: Vec::new(),
            artifacts_touched: self.artifacts_touched,
            evidence: self.evidence,
            problem_signature,
        }
    }
}

/// Index-level changes produced by one synthesis pass. Scalars are
/// latest-wins when present; `new_verified_facts` append after exact-text
/// dedup; `next_actions` replace the prior sequence wholesale.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default, JsonSchema)]
pub struct IndexDelta {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub current_goal: Option<String>,
    #[serde(default)]
    pub project_status: Option<String>,
    #[serde(default)]
    pub new_verified_facts: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<String>,
}

/// The single JSON object the oracle must emit: one resolution draft plus the
/// index delta. Its schemars-generated schema is embedded verbatim in the
/// synthesis prompt.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct SynthesisOutput {
    pub resolution: ResolutionDraft,
    pub index_delta: IndexDelta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn draft() -> ResolutionDraft {
        ResolutionDraft {
            problem: "Connection refused on port 6379".to_string(),
            root_cause: "redis container not on the compose network".to_string(),
            final_fix: vec!["attach the app service to the redis network".to_string()],
            why_it_works: None,
            verification: vec!["redis-cli ping returns PONG".to_string()],
            anti_patterns: vec!["restarting the container without network changes".to_string()],
            artifacts_touched: vec!["docker-compose.yml".to_string()],
            evidence: Evidence::default(),
            short_title: "redis unreachable from app container".to_string(),
            tags: vec!["docker".to_string(), "redis".to_string()],
            supersedes_prior_fix: false,
        }
    }

    #[test]
    fn draft_missing_fields_flags_empty_required() {
        let mut d = draft();
        assert!(d.missing_fields().is_empty());

        d.problem = "  ".to_string();
        d.final_fix = vec![String::new()];
        assert_eq!(d.missing_fields(), vec!["problem", "final_fix"]);
    }

    #[test]
    fn draft_into_resolution_carries_fields() {
        let res = draft().into_resolution("res-001".to_string(), "sig".to_string());
        assert_eq!(res.id, "res-001");
        assert_eq!(res.problem_signature, "sig");
        assert!(res.supplements.is_empty());
        assert_eq!(res.final_fix.len(), 1);
    }

    #[test]
    fn synthesis_output_tolerates_omitted_optionals() {
        let raw = r#"{
            "resolution": {
                "problem": "build fails",
                "root_cause": "stale lockfile",
                "final_fix": ["regenerate the lockfile"],
                "short_title": "stale lockfile broke the build"
            },
            "index_delta": {}
        }"#;
        let out: SynthesisOutput = serde_json::from_str(raw).expect("parse");
        assert!(!out.resolution.supersedes_prior_fix);
        assert!(out.index_delta.current_goal.is_none());
        assert!(out.resolution.missing_fields().is_empty());
    }

    #[test]
    fn index_serde_round_trip() {
        let mut index = ContextIndex::new();
        index.verified_facts.push("cluster_state:ok".to_string());
        index.resolutions.push(ResolutionRef {
            id: "res-001".to_string(),
            problem_signature: "connection refused port 6379".to_string(),
            short_title: "redis unreachable".to_string(),
            tags: vec![],
            artifacts_touched: vec![],
        });

        let raw = serde_json::to_string(&index).expect("serialize");
        let back: ContextIndex = serde_json::from_str(&raw).expect("parse");
        assert_eq!(index, back);
    }
}
