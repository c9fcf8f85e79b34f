use recall_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Archival-side failure taxonomy. Every variant aborts the run before any
/// file write; existing knowledge is never touched by a failed run.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// No window could be selected: empty transcript, no goal statement, or
    /// no confirmed fix evidence. Synthesizing from such a window would
    /// fabricate knowledge, so the pipeline refuses.
    #[error("no archivable resolution in the transcript window: {0}")]
    TranscriptUnavailable(String),

    /// Transport, auth, rate-limit, or a response that is not the expected
    /// JSON object at all. Recoverable; retry or surface.
    #[error("oracle call failed: {0}")]
    OracleFailure(String),

    /// The oracle returned parseable JSON with missing or empty required
    /// fields. Rejected before the merge engine runs.
    #[error("oracle draft rejected: {0}")]
    SchemaViolation(String),

    #[error("knowledge base is locked by another archival run")]
    LockContention,

    #[error("corrupt knowledge base: {0}")]
    CorruptKnowledgeBase(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ArchiveError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockContention => ArchiveError::LockContention,
            StoreError::Corrupt(msg) => ArchiveError::CorruptKnowledgeBase(msg),
            StoreError::Io(err) => ArchiveError::Io(err),
            StoreError::Serialize(err) => ArchiveError::CorruptKnowledgeBase(err.to_string()),
        }
    }
}
