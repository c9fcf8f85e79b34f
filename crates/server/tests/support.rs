use anyhow::{Context, Result};
use std::path::PathBuf;

pub fn locate_recall_server_bin() -> Result<PathBuf> {
    if let Some(path) = option_env!("CARGO_BIN_EXE_recall-server") {
        return Ok(PathBuf::from(path));
    }

    // Try to resolve from the current test executable location.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(target_profile_dir) = exe.parent().and_then(|p| p.parent()) {
            let candidate = target_profile_dir.join("recall-server");
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    anyhow::bail!(
        "failed to locate recall-server binary; build with: cargo build -p recall-server"
    )
}
