use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An existing index or resolution file failed to parse, or the index
    /// points at a resolution file that is not on disk. Writers must abort
    /// rather than overwrite.
    #[error("corrupt knowledge base: {0}")]
    Corrupt(String),

    #[error("knowledge base lock is held by another archival run")]
    LockContention,

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
