//! Retrieval server core: read-only queries over a project's knowledge base.
//!
//! Every call re-reads current on-disk state: the base may have been updated
//! by an archival run since the last request, and staleness is not
//! acceptable. Reads are lock-free; a transient parse failure during a
//! concurrent update is returned as a `corrupt` error for the caller to
//! retry. No request, however malformed, terminates the server.

use recall_protocol::{ErrorEnvelope, RetrievalRequest};
use recall_store::{KnowledgeStore, StoreError};
use serde_json::Value;
use std::path::Path;

/// Handle one request line and produce one response line (without trailing
/// newline). Never fails: every problem becomes a structured error response.
pub fn handle_request_line(root: &Path, line: &str) -> String {
    let response = match serde_json::from_str::<RetrievalRequest>(line) {
        Ok(request) => handle_request(root, request),
        Err(err) => Err(ErrorEnvelope::bad_request(format!(
            "unrecognized request: {err}"
        ))),
    };

    let value = match response {
        Ok(value) => value,
        Err(envelope) => serde_json::to_value(&envelope)
            .unwrap_or_else(|_| serde_json::json!({"error": "corrupt", "message": "unserializable error"})),
    };
    value.to_string()
}

fn handle_request(root: &Path, request: RetrievalRequest) -> Result<Value, ErrorEnvelope> {
    let store = KnowledgeStore::for_project_root(root);
    match request {
        RetrievalRequest::ReadContextIndex => match store.load_index() {
            Ok(Some(index)) => to_value(&index),
            Ok(None) => Err(ErrorEnvelope::not_found(
                "no context index for this project",
            )),
            Err(err) => Err(read_error(err)),
        },
        RetrievalRequest::ReadContextResolution { res_id } => {
            if recall_store::parse_resolution_id(&res_id).is_none() {
                return Err(ErrorEnvelope::bad_request(format!(
                    "malformed resolution id: {res_id:?}"
                )));
            }
            match store.load_resolution(&res_id) {
                Ok(Some(resolution)) => to_value(&resolution),
                Ok(None) => Err(ErrorEnvelope::not_found(format!(
                    "no resolution {res_id} for this project"
                ))),
                Err(err) => Err(read_error(err)),
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ErrorEnvelope> {
    serde_json::to_value(value).map_err(|err| ErrorEnvelope::corrupt(err.to_string()))
}

fn read_error(err: StoreError) -> ErrorEnvelope {
    match err {
        StoreError::Corrupt(msg) => ErrorEnvelope::corrupt(msg),
        other => ErrorEnvelope::corrupt(format!("read failed: {other}")),
    }
}
