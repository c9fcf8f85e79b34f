//! Merge engine: folds one synthesized episode into the on-disk knowledge
//! base. Runs entirely under the project's exclusive lock and commits the
//! resolution file and the index together, or not at all.

use crate::store::{write_atomic, KnowledgeStore};
use crate::{Result, StoreError};
use recall_protocol::{ContextIndex, IndexDelta, Resolution, ResolutionDraft, ResolutionRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub resolution_id: String,
    /// False when an existing resolution with the same signature was refined.
    pub created: bool,
    /// True when the draft was marked as a correction and replaced the prior
    /// fix.
    pub superseded: bool,
    pub facts_added: usize,
    pub anti_patterns_added: usize,
    pub verification_added: usize,
}

/// Reconcile a validated draft and index delta against the knowledge base.
///
/// Signature lookup is exact string equality of normalized signatures; the
/// normalization step upstream is what makes near-duplicate phrasings land on
/// the same key. The draft's signature must already be computed; the store
/// never derives one.
pub fn merge_archive(
    store: &KnowledgeStore,
    draft: ResolutionDraft,
    signature: String,
    delta: IndexDelta,
) -> Result<MergeOutcome> {
    merge_archive_inner(store, draft, signature, delta, || Ok(()))
}

/// `between` runs after the resolution write and before the index write;
/// tests inject failures there to exercise the rollback path.
pub(crate) fn merge_archive_inner(
    store: &KnowledgeStore,
    draft: ResolutionDraft,
    signature: String,
    delta: IndexDelta,
    between: impl FnOnce() -> Result<()>,
) -> Result<MergeOutcome> {
    let _lock = store.lock()?;

    let mut index = store.load_index()?.unwrap_or_default();

    let matched = index
        .resolutions
        .iter()
        .position(|r| r.problem_signature == signature);

    let (resolution, prior_bytes, created, superseded, anti_added, verification_added) =
        match matched {
            None => {
                let id = store.next_resolution_id(&index)?;
                let reference = ResolutionRef {
                    id: id.clone(),
                    problem_signature: signature.clone(),
                    short_title: draft.short_title.clone(),
                    tags: draft.tags.clone(),
                    artifacts_touched: draft.artifacts_touched.clone(),
                };
                let resolution = draft.into_resolution(id, signature);
                let anti = resolution.anti_patterns.len();
                let verification = resolution.verification.len();
                index.resolutions.push(reference);
                (resolution, None, true, false, anti, verification)
            }
            Some(pos) => {
                let id = index.resolutions[pos].id.clone();
                let mut existing = store.load_resolution(&id)?.ok_or_else(|| {
                    StoreError::Corrupt(format!(
                        "index references {id} but {} is missing",
                        store.resolution_path(&id).display()
                    ))
                })?;
                let mut prior = serde_json::to_vec_pretty(&existing)?;
                prior.push(b'\n');

                let (superseded, anti, verification) =
                    refine(&mut existing, &mut index.resolutions[pos], draft);
                (existing, Some(prior), false, superseded, anti, verification)
            }
        };

    let facts_added = apply_delta(&mut index, delta);

    let mut resolution_bytes = serde_json::to_vec_pretty(&resolution)?;
    resolution_bytes.push(b'\n');
    let mut index_bytes = serde_json::to_vec_pretty(&index)?;
    index_bytes.push(b'\n');

    commit(
        store,
        &resolution.id,
        prior_bytes,
        &resolution_bytes,
        &index_bytes,
        between,
    )?;

    log::info!(
        "merged {} ({}) into {}",
        resolution.id,
        if created { "new" } else { "refined" },
        store.context_dir().display()
    );

    Ok(MergeOutcome {
        resolution_id: resolution.id,
        created,
        superseded,
        facts_added,
        anti_patterns_added: anti_added,
        verification_added,
    })
}

/// Fold a draft into an existing resolution with the same signature. Lists
/// grow by exact-text union; the prior fix is only displaced when the draft
/// is an explicit correction, and even then it is kept in `supplements`.
fn refine(
    existing: &mut Resolution,
    reference: &mut ResolutionRef,
    draft: ResolutionDraft,
) -> (bool, usize, usize) {
    let anti_added = append_unique(&mut existing.anti_patterns, draft.anti_patterns.clone());
    let verification_added = append_unique(&mut existing.verification, draft.verification.clone());
    append_unique(&mut existing.evidence.signals, draft.evidence.signals.clone());
    if draft.evidence.when.is_some() {
        existing.evidence.when = draft.evidence.when.clone();
    }
    append_unique(
        &mut existing.artifacts_touched,
        draft.artifacts_touched.clone(),
    );
    append_unique(&mut reference.artifacts_touched, draft.artifacts_touched.clone());
    append_unique(&mut reference.tags, draft.tags.clone());

    let superseded = draft.supersedes_prior_fix;
    if superseded {
        let displaced = format!(
            "superseded fix: {} (root cause recorded as: {})",
            existing.final_fix.join("; "),
            existing.root_cause
        );
        push_unique(&mut existing.supplements, displaced);
        existing.final_fix = draft.final_fix;
        existing.root_cause = draft.root_cause;
        if draft.why_it_works.is_some() {
            existing.why_it_works = draft.why_it_works;
        }
        reference.short_title = draft.short_title;
    } else {
        push_unique(&mut existing.supplements, draft.fix_as_note());
    }

    (superseded, anti_added, verification_added)
}

fn apply_delta(index: &mut ContextIndex, delta: IndexDelta) -> usize {
    if let Some(project) = delta.project {
        index.project = project;
    }
    if let Some(goal) = delta.current_goal {
        index.current_goal = goal;
    }
    if let Some(status) = delta.project_status {
        index.project_status = status;
    }
    let facts_added = append_unique(&mut index.verified_facts, delta.new_verified_facts);
    index.next_actions = delta.next_actions;
    facts_added
}

fn append_unique(dst: &mut Vec<String>, src: impl IntoIterator<Item = String>) -> usize {
    let mut added = 0;
    for item in src {
        if push_unique(dst, item) {
            added += 1;
        }
    }
    added
}

fn push_unique(dst: &mut Vec<String>, item: String) -> bool {
    if item.trim().is_empty() || dst.contains(&item) {
        return false;
    }
    dst.push(item);
    true
}

/// Resolution first, index second. When the index write fails the resolution
/// file is rolled back (deleted if this run created it, restored otherwise),
/// so the index never references a state it did not commit.
fn commit(
    store: &KnowledgeStore,
    id: &str,
    prior_resolution: Option<Vec<u8>>,
    resolution_bytes: &[u8],
    index_bytes: &[u8],
    between: impl FnOnce() -> Result<()>,
) -> Result<()> {
    let resolution_path = store.resolution_path(id);

    write_atomic(&resolution_path, resolution_bytes)?;

    let finish = (|| -> Result<()> {
        between()?;
        write_atomic(&store.index_path(), index_bytes)
    })();

    if let Err(err) = finish {
        match prior_resolution {
            Some(bytes) => {
                let _ = write_atomic(&resolution_path, &bytes);
            }
            None => {
                let _ = std::fs::remove_file(&resolution_path);
                if let Some(dir) = resolution_path.parent() {
                    // Only succeeds when this run created the directory and
                    // nothing else landed in it.
                    let _ = std::fs::remove_dir(dir);
                }
            }
        }
        return Err(err);
    }
    Ok(())
}
