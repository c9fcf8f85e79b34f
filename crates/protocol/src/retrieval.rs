//! Wire types for the retrieval protocol: newline-delimited JSON
//! request/response pairs between the retrieval server and its caller.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One request line. The `op` tag names the operation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RetrievalRequest {
    ReadContextIndex,
    ReadContextResolution { res_id: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalErrorKind {
    /// The knowledge base (or the named resolution) does not exist.
    NotFound,
    /// On-disk JSON exists but did not parse; the caller may retry, a writer
    /// could have been mid-update.
    Corrupt,
    /// The request line itself was not a valid operation.
    BadRequest,
}

/// Error result for a request line: `{"error": <kind>, "message": <string>}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ErrorEnvelope {
    pub error: RetrievalErrorKind,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            error: RetrievalErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self {
            error: RetrievalErrorKind::Corrupt,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            error: RetrievalErrorKind::BadRequest,
            message: message.into(),
        }
    }
}
