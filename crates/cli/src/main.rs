//! `recall-save`: the archival trigger.
//!
//! Invoked by the host's save hook with a JSON payload on stdin
//! (`{"transcript_path": ..., "cwd": ...}`), or manually with explicit
//! flags. Runs one archival pipeline pass and reports the outcome on stderr;
//! stdout stays clean.

use anyhow::{Context, Result};
use clap::Parser;
use recall_archiver::{archive, AnthropicOracle, ArchiveRequest, OracleSettings, DEFAULT_MAX_LINES};
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;

const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";

#[derive(Parser)]
#[command(name = "recall-save")]
#[command(about = "Archive this session's solved problems into the project knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    /// Transcript file (JSONL). When omitted, a hook payload is read from stdin
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Project root owning the knowledge base. Default: --transcript mode
    /// uses $CLAUDE_PROJECT_DIR then the current directory; hook mode also
    /// consults the payload's cwd
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Most recent transcript lines considered
    #[arg(long, default_value_t = DEFAULT_MAX_LINES)]
    max_lines: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long)]
    quiet: bool,
}

/// What the host's command-submission hook pipes in.
#[derive(Debug, Default, Deserialize)]
struct HookPayload {
    #[serde(default)]
    transcript_path: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();

    match run(cli).await {
        Ok(summary) => {
            eprintln!("✔ context archive updated");
            eprintln!("  {summary}");
        }
        Err(err) => {
            eprintln!("✖ archive failed: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    let payload = if cli.transcript.is_none() {
        read_hook_payload()?
    } else {
        HookPayload::default()
    };

    let transcript = cli
        .transcript
        .or_else(|| payload.transcript_path.as_deref().map(expand_home))
        .context("no transcript: pass --transcript or pipe a hook payload with transcript_path")?;

    let project_root = cli
        .project_root
        .or_else(|| std::env::var(PROJECT_DIR_ENV).ok().map(PathBuf::from))
        .or_else(|| payload.cwd.clone().map(PathBuf::from))
        .map(Ok)
        .unwrap_or_else(|| std::env::current_dir().context("resolve current directory"))?;

    log::info!(
        "archiving {} into {} (last {} lines)",
        transcript.display(),
        project_root.display(),
        cli.max_lines
    );

    let settings = OracleSettings::load()?;
    let oracle = AnthropicOracle::new(settings)?;

    let mut request = ArchiveRequest::new(project_root, transcript);
    request.max_lines = cli.max_lines;

    let report = archive(&request, &oracle).await?;
    Ok(report.summary())
}

fn read_hook_payload() -> Result<HookPayload> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("read hook payload from stdin")?;
    if raw.trim().is_empty() {
        return Ok(HookPayload::default());
    }
    serde_json::from_str(&raw).context("hook payload is not valid JSON")
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
