//! # Recall Store
//!
//! Per-project knowledge base on disk, plus the merge engine that folds newly
//! synthesized episodes into it.
//!
//! ## Layout
//!
//! ```text
//! <project root>/.claude/context/
//!     ├── index.json            aggregate index (goal, status, facts, refs)
//!     ├── context.lock          advisory lock taken for read-merge-write
//!     └── resolutions/
//!         ├── res-001.json      one archived episode per file
//!         └── res-002.json
//! ```
//!
//! Writers hold an exclusive advisory lock on `context.lock` for the whole
//! read-merge-write sequence; readers never lock and must treat a transient
//! parse failure as retryable.

mod error;
mod lock;
mod merge;
mod paths;
mod store;

pub use error::{Result, StoreError};
pub use lock::StoreLock;
pub use merge::{merge_archive, MergeOutcome};
pub use paths::{
    context_dir_for_project_root, format_resolution_id, index_path, lock_path,
    parse_resolution_id, resolution_path, resolutions_dir, INDEX_FILE_NAME, LOCK_FILE_NAME,
    RESOLUTIONS_DIR_NAME,
};
pub use store::KnowledgeStore;
