use std::path::{Path, PathBuf};

pub const CLAUDE_DIR_NAME: &str = ".claude";
pub const CONTEXT_DIR_NAME: &str = "context";
pub const INDEX_FILE_NAME: &str = "index.json";
pub const RESOLUTIONS_DIR_NAME: &str = "resolutions";
pub const LOCK_FILE_NAME: &str = "context.lock";

const RESOLUTION_ID_PREFIX: &str = "res-";

#[must_use]
pub fn context_dir_for_project_root(root: &Path) -> PathBuf {
    root.join(CLAUDE_DIR_NAME).join(CONTEXT_DIR_NAME)
}

#[must_use]
pub fn index_path(root: &Path) -> PathBuf {
    context_dir_for_project_root(root).join(INDEX_FILE_NAME)
}

#[must_use]
pub fn resolutions_dir(root: &Path) -> PathBuf {
    context_dir_for_project_root(root).join(RESOLUTIONS_DIR_NAME)
}

#[must_use]
pub fn resolution_path(root: &Path, id: &str) -> PathBuf {
    resolutions_dir(root).join(format!("{id}.json"))
}

#[must_use]
pub fn lock_path(root: &Path) -> PathBuf {
    context_dir_for_project_root(root).join(LOCK_FILE_NAME)
}

/// Format a resolution id: `res-001`, `res-002`, … zero-padded to three
/// digits, growing naturally past 999.
#[must_use]
pub fn format_resolution_id(n: u32) -> String {
    format!("{RESOLUTION_ID_PREFIX}{n:03}")
}

/// Numeric part of a resolution id (`res-012` → 12). `None` for anything
/// that is not a well-formed id.
#[must_use]
pub fn parse_resolution_id(id: &str) -> Option<u32> {
    let digits = id.strip_prefix(RESOLUTION_ID_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Numeric part of a resolution file name (`res-012.json` → 12).
#[must_use]
pub fn parse_resolution_file_name(name: &str) -> Option<u32> {
    parse_resolution_id(name.strip_suffix(".json")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_format_and_parse_round_trip() {
        assert_eq!(format_resolution_id(1), "res-001");
        assert_eq!(format_resolution_id(42), "res-042");
        assert_eq!(format_resolution_id(1000), "res-1000");

        assert_eq!(parse_resolution_id("res-001"), Some(1));
        assert_eq!(parse_resolution_id("res-1000"), Some(1000));
        assert_eq!(parse_resolution_id("res-"), None);
        assert_eq!(parse_resolution_id("res-01x"), None);
        assert_eq!(parse_resolution_id("note-001"), None);
    }

    #[test]
    fn file_name_parse_requires_json_suffix() {
        assert_eq!(parse_resolution_file_name("res-007.json"), Some(7));
        assert_eq!(parse_resolution_file_name("res-007"), None);
        assert_eq!(parse_resolution_file_name(".res-007.json.tmp-123"), None);
    }

    #[test]
    fn layout_is_rooted_under_claude_context() {
        let root = Path::new("/work/proj");
        assert_eq!(
            index_path(root),
            Path::new("/work/proj/.claude/context/index.json")
        );
        assert_eq!(
            resolution_path(root, "res-003"),
            Path::new("/work/proj/.claude/context/resolutions/res-003.json")
        );
        assert_eq!(
            lock_path(root),
            Path::new("/work/proj/.claude/context/context.lock")
        );
    }
}
