//! Oracle configuration. Credentials and model selection come from the host
//! environment: process env vars first, then the `env` block of
//! `~/.claude/settings.json`. Nothing here is project-scoped.

use crate::{ArchiveError, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

const AUTH_TOKEN_KEY: &str = "ANTHROPIC_AUTH_TOKEN";
const BASE_URL_KEY: &str = "ANTHROPIC_BASE_URL";
const MODEL_KEY: &str = "ANTHROPIC_REASONING_MODEL";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub auth_token: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OracleSettings {
    /// Resolve settings from the environment, falling back to the user-level
    /// settings file. A missing auth token is a configuration error reported
    /// before any transcript work happens.
    pub fn load() -> Result<Self> {
        Self::load_from(user_settings_path(), |key| std::env::var(key).ok())
    }

    pub(crate) fn load_from(
        settings_path: Option<PathBuf>,
        env_lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file_env = settings_path
            .and_then(|path| read_settings_env(&path))
            .unwrap_or(Value::Null);

        let lookup = |key: &str| -> Option<String> {
            env_lookup(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| {
                    file_env
                        .get(key)
                        .and_then(Value::as_str)
                        .map(|s| s.to_string())
                        .filter(|v| !v.trim().is_empty())
                })
        };

        let auth_token = lookup(AUTH_TOKEN_KEY).ok_or_else(|| {
            ArchiveError::Config(format!(
                "{AUTH_TOKEN_KEY} not set (env or ~/.claude/settings.json `env` block)"
            ))
        })?;

        Ok(Self {
            auth_token,
            base_url: lookup(BASE_URL_KEY).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: lookup(MODEL_KEY).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

fn user_settings_path() -> Option<PathBuf> {
    Some(dirs::home_dir()?.join(".claude").join("settings.json"))
}

fn read_settings_env(path: &std::path::Path) -> Option<Value> {
    let raw = std::fs::read_to_string(path).ok()?;
    let settings: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(err) => {
            log::warn!("ignoring unparsable settings file {}: {err}", path.display());
            return None;
        }
    };
    settings.get("env").cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_file_env_block_supplies_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"env":{"ANTHROPIC_AUTH_TOKEN":"tok-123","ANTHROPIC_BASE_URL":"http://proxy.local:8317"}}"#,
        )
        .expect("write");

        let settings = OracleSettings::load_from(Some(path), |_| None).expect("load");
        assert_eq!(settings.auth_token, "tok-123");
        assert_eq!(settings.base_url, "http://proxy.local:8317");
        assert_eq!(settings.model, DEFAULT_MODEL);
    }

    #[test]
    fn process_env_wins_over_settings_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"env":{"ANTHROPIC_AUTH_TOKEN":"from-file"}}"#).expect("write");

        let settings = OracleSettings::load_from(Some(path), |key| {
            (key == AUTH_TOKEN_KEY).then(|| "from-env".to_string())
        })
        .expect("load");
        assert_eq!(settings.auth_token, "from-env");
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"env":{}}"#).expect("write");

        let err = OracleSettings::load_from(Some(path), |_| None)
            .err()
            .expect("fail");
        assert!(matches!(err, ArchiveError::Config(_)));
    }
}
