use anyhow::{Context, Result};
use recall_protocol::{Evidence, IndexDelta, ResolutionDraft};
use recall_store::{merge_archive, KnowledgeStore};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

mod support;

async fn send_line(stdin: &mut tokio::process::ChildStdin, line: &str) -> Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await?;
    Ok(())
}

async fn read_line_json(stdout: &mut BufReader<tokio::process::ChildStdout>) -> Result<Value> {
    loop {
        let mut line = String::new();
        let n = tokio::time::timeout(Duration::from_secs(10), stdout.read_line(&mut line))
            .await
            .context("timeout reading json line")??;
        if n == 0 {
            anyhow::bail!("EOF while reading json line");
        }
        if line.trim().is_empty() {
            continue;
        }
        return Ok(serde_json::from_str(&line)?);
    }
}

fn seed_resolution(root: &std::path::Path) -> Result<()> {
    let store = KnowledgeStore::for_project_root(root);
    let draft = ResolutionDraft {
        problem: "the input device is not a TTY".to_string(),
        root_cause: "docker exec -t in a non-interactive hook".to_string(),
        final_fix: vec!["drop the -t flag from the hook command".to_string()],
        why_it_works: None,
        verification: vec!["hook runs clean in CI".to_string()],
        anti_patterns: vec!["wrapping the call in script(1)".to_string()],
        artifacts_touched: vec![".claude/hooks.json".to_string()],
        evidence: Evidence::default(),
        short_title: "docker exec TTY failure in hooks".to_string(),
        tags: vec!["docker".to_string()],
        supersedes_prior_fix: false,
    };
    let delta = IndexDelta {
        project: Some("hooks".to_string()),
        current_goal: Some("make hooks non-interactive".to_string()),
        project_status: Some("hooks_green".to_string()),
        new_verified_facts: vec!["CI no longer allocates a TTY".to_string()],
        next_actions: vec![],
    };
    merge_archive(&store, draft, "input device is not a tty".to_string(), delta)?;
    Ok(())
}

#[tokio::test]
async fn serves_reads_and_survives_bad_requests() -> Result<()> {
    let dir = tempfile::tempdir()?;
    seed_resolution(dir.path())?;

    let bin = support::locate_recall_server_bin()?;
    let mut cmd = Command::new(bin);
    cmd.arg(dir.path());
    cmd.env("RUST_LOG", "warn");
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::null());

    let mut child = cmd.spawn().context("spawn retrieval server")?;
    let mut stdin = child.stdin.take().context("stdin")?;
    let stdout = child.stdout.take().context("stdout")?;
    let mut stdout = BufReader::new(stdout);

    // Index read reflects the seeded merge.
    send_line(&mut stdin, r#"{"op":"read_context_index"}"#).await?;
    let index = read_line_json(&mut stdout).await?;
    assert_eq!(
        index.get("project").and_then(Value::as_str),
        Some("hooks")
    );
    let refs = index
        .get("resolutions")
        .and_then(Value::as_array)
        .context("resolutions array")?;
    assert_eq!(refs.len(), 1);

    // Resolution read by id.
    send_line(
        &mut stdin,
        r#"{"op":"read_context_resolution","res_id":"res-001"}"#,
    )
    .await?;
    let resolution = read_line_json(&mut stdout).await?;
    assert_eq!(
        resolution.get("id").and_then(Value::as_str),
        Some("res-001")
    );

    // Unknown id: a not_found error response, not a dead server.
    send_line(
        &mut stdin,
        r#"{"op":"read_context_resolution","res_id":"res-999"}"#,
    )
    .await?;
    let missing = read_line_json(&mut stdout).await?;
    assert_eq!(
        missing.get("error").and_then(Value::as_str),
        Some("not_found")
    );

    // Garbage line: bad_request, still not a dead server.
    send_line(&mut stdin, "definitely { not json").await?;
    let garbage = read_line_json(&mut stdout).await?;
    assert_eq!(
        garbage.get("error").and_then(Value::as_str),
        Some("bad_request")
    );

    // The server keeps serving after both error responses.
    send_line(&mut stdin, r#"{"op":"read_context_index"}"#).await?;
    let again = read_line_json(&mut stdout).await?;
    assert!(again.get("resolutions").is_some());

    let _ = child.kill().await;
    Ok(())
}

#[tokio::test]
async fn reads_are_fresh_across_updates() -> Result<()> {
    let dir = tempfile::tempdir()?;
    seed_resolution(dir.path())?;

    let bin = support::locate_recall_server_bin()?;
    let mut cmd = Command::new(bin);
    cmd.arg(dir.path());
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::null());

    let mut child = cmd.spawn().context("spawn retrieval server")?;
    let mut stdin = child.stdin.take().context("stdin")?;
    let stdout = child.stdout.take().context("stdout")?;
    let mut stdout = BufReader::new(stdout);

    send_line(&mut stdin, r#"{"op":"read_context_index"}"#).await?;
    let first = read_line_json(&mut stdout).await?;
    assert_eq!(
        first
            .get("resolutions")
            .and_then(Value::as_array)
            .map(|a| a.len()),
        Some(1)
    );

    // A second archival lands while the server is running; the next read
    // must see it without any restart.
    let store = KnowledgeStore::for_project_root(dir.path());
    let draft = ResolutionDraft {
        problem: "Pool overlaps with other one".to_string(),
        root_cause: "stale docker network left behind".to_string(),
        final_fix: vec!["docker network prune before compose up".to_string()],
        why_it_works: None,
        verification: vec!["compose up succeeds".to_string()],
        anti_patterns: vec!["renaming the project to dodge the clash".to_string()],
        artifacts_touched: vec![],
        evidence: Evidence::default(),
        short_title: "docker address pool overlap".to_string(),
        tags: vec!["docker".to_string()],
        supersedes_prior_fix: false,
    };
    merge_archive(
        &store,
        draft,
        "pool overlaps with other one".to_string(),
        IndexDelta::default(),
    )?;

    send_line(&mut stdin, r#"{"op":"read_context_index"}"#).await?;
    let second = read_line_json(&mut stdout).await?;
    assert_eq!(
        second
            .get("resolutions")
            .and_then(Value::as_array)
            .map(|a| a.len()),
        Some(2)
    );

    let _ = child.kill().await;
    Ok(())
}
