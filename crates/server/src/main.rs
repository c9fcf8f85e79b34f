//! Recall Retrieval Server
//!
//! Serves read-only knowledge-base queries for one project over stdio:
//! newline-delimited JSON requests in, one JSON result or error object per
//! line out.
//!
//! ## Operations
//!
//! - `{"op":"read_context_index"}` returns the project's context index
//! - `{"op":"read_context_resolution","res_id":"res-001"}` returns one resolution
//!
//! The project root is the first argument, defaulting to the current
//! directory. Run one server per session; reads always reflect current disk
//! state.

use anyhow::{Context, Result};
use recall_server::handle_request_line;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging to stderr only; stdout is reserved for the protocol.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let root = match std::env::args().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => std::env::current_dir().context("resolve current directory")?,
    };
    log::info!("recall retrieval server for {}", root.display());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("read request line")? {
        if line.trim().is_empty() {
            continue;
        }
        let mut response = handle_request_line(&root, line.trim());
        response.push('\n');
        stdout
            .write_all(response.as_bytes())
            .await
            .context("write response")?;
        stdout.flush().await.context("flush response")?;
    }

    log::info!("recall retrieval server stopped");
    Ok(())
}
