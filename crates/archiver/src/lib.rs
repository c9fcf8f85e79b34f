//! # Recall Archiver
//!
//! The archival pipeline: turn the tail of a coding-session transcript into a
//! structured resolution and fold it into the project's knowledge base.
//!
//! ## Pipeline
//!
//! ```text
//! transcript (JSONL)
//!     │  tail, bounded to max_lines
//!     ├──> Window Selector (goal, key turns, tool calls, fix evidence)
//!     │      └─> refuses to proceed without confirmed fix evidence
//!     ├──> Oracle (pluggable text-generation backend)
//!     │      └─> ResolutionDraft + IndexDelta, schema-validated
//!     └──> Merge Engine (recall-store, under the project lock)
//! ```
//!
//! The oracle call is the only slow, network-bound step and runs before the
//! merge lock is taken.

mod error;
mod oracle;
mod pipeline;
mod settings;
mod signature;
mod transcript;
mod window;

pub use error::{ArchiveError, Result};
pub use oracle::{parse_synthesis_text, AnthropicOracle, Oracle, SynthesisRequest};
pub use pipeline::{archive, ArchiveReport, ArchiveRequest};
pub use settings::OracleSettings;
pub use signature::normalize;
pub use transcript::{parse_transcript_lines, tail_lines, Role, TranscriptEvent};
pub use window::{select_window, DialogueTurn, ToolCall, TranscriptWindow, DEFAULT_MAX_LINES};
