//! Knowledge synthesizer: the pluggable text-generation oracle that turns a
//! selected window into a structured resolution draft plus index delta. Only
//! the interface is owned here; any backend satisfying [`Oracle`] can be
//! substituted without touching the merge engine.

use crate::window::TranscriptWindow;
use crate::{ArchiveError, OracleSettings, Result};
use async_trait::async_trait;
use recall_protocol::{ContextIndex, SynthesisOutput};
use serde_json::Value;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 8192;
// Low temperature keeps the JSON output format stable across runs.
const TEMPERATURE: f32 = 0.1;
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
    pub window: &'a TranscriptWindow,
    /// Snapshot of the current index so the oracle can decide goal/status
    /// updates and avoid duplicating known facts. `None` for a brand-new
    /// project.
    pub current_index: Option<&'a ContextIndex>,
}

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<SynthesisOutput>;
}

/// Anthropic-style messages API backend.
pub struct AnthropicOracle {
    client: reqwest::Client,
    settings: OracleSettings,
}

impl AnthropicOracle {
    pub fn new(settings: OracleSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| ArchiveError::OracleFailure(format!("http client: {err}")))?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl Oracle for AnthropicOracle {
    async fn synthesize(&self, request: SynthesisRequest<'_>) -> Result<SynthesisOutput> {
        let url = format!(
            "{}/v1/messages",
            self.settings.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.settings.model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "temperature": TEMPERATURE,
            "system": system_prompt(),
            "messages": [{ "role": "user", "content": user_content(&request) }],
        });

        log::debug!("oracle request to {url} (model {})", self.settings.model);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.settings.auth_token)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| ArchiveError::OracleFailure(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(ArchiveError::OracleFailure(format!(
                "oracle returned {status}: {body}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| ArchiveError::OracleFailure(format!("response body: {err}")))?;
        let text = payload
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| {
                blocks.iter().find_map(|b| {
                    (b.get("type").and_then(Value::as_str) == Some("text"))
                        .then(|| b.get("text").and_then(Value::as_str))
                        .flatten()
                })
            })
            .ok_or_else(|| {
                ArchiveError::OracleFailure("oracle response carried no text content".to_string())
            })?;

        parse_synthesis_text(text)
    }
}

/// Parse the oracle's raw text into a [`SynthesisOutput`]. Tolerates a
/// markdown fence or surrounding prose; anything without a JSON object is an
/// oracle failure, an object that misses the schema is a draft rejection.
pub fn parse_synthesis_text(text: &str) -> Result<SynthesisOutput> {
    let start = text.find('{');
    let end = text.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(ArchiveError::OracleFailure(
            "no JSON object in oracle response".to_string(),
        ));
    };
    if end < start {
        return Err(ArchiveError::OracleFailure(
            "no JSON object in oracle response".to_string(),
        ));
    }

    serde_json::from_str(&text[start..=end])
        .map_err(|err| ArchiveError::SchemaViolation(format!("draft does not match schema: {err}")))
}

fn system_prompt() -> String {
    let schema = schemars::schema_for!(SynthesisOutput);
    let schema = serde_json::to_string_pretty(&schema).unwrap_or_default();

    format!(
        "You are a conversation archivist. You distill a long dialogue between \
a user and a coding agent into reusable engineering context.\n\
\n\
From the material you will receive, do the following:\n\
1) Identify the project's current goal and status.\n\
2) Extract verified facts only: things the dialogue actually confirmed, \
never guesses. Do not repeat facts the current index already holds.\n\
3) Distill the one resolution that finally worked: reproducible final_fix \
steps, the root cause, why it works, and concrete verification checks. When \
the same problem was attempted several times, the last successful path is the \
fix.\n\
4) Record 1-3 anti_patterns: approaches that were tried and did not work.\n\
5) Record artifacts_touched as file paths or component names only, never \
file contents.\n\
6) Put success judgements (key log fragments, at most 160 characters each) \
into evidence.signals.\n\
7) Set supersedes_prior_fix to true only when this episode corrects a fix \
the index already records for the same problem; otherwise leave it false.\n\
\n\
Output exactly one JSON object and nothing else, with no markdown and no \
commentary. It must validate against this schema:\n\
\n\
{schema}"
    )
}

fn user_content(request: &SynthesisRequest<'_>) -> String {
    let index = match request.current_index {
        Some(index) => serde_json::to_string_pretty(index).unwrap_or_default(),
        None => "(no index yet - this is the project's first archival)".to_string(),
    };
    format!(
        "## Current knowledge index\n{index}\n\n{}",
        request.window.render_material()
    )
}
