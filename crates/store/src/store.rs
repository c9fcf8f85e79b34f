use crate::lock::{StoreLock, LOCK_ATTEMPTS, LOCK_RETRY_DELAY};
use crate::paths::{
    self, context_dir_for_project_root, index_path, lock_path, resolution_path, resolutions_dir,
};
use crate::{Result, StoreError};
use recall_protocol::{ContextIndex, Resolution};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Handle on one project's knowledge base. Holds no open files and caches
/// nothing: every load re-reads current on-disk state, so a store updated by
/// another process is never served stale.
pub struct KnowledgeStore {
    root: PathBuf,
}

impl KnowledgeStore {
    pub fn for_project_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn context_dir(&self) -> PathBuf {
        context_dir_for_project_root(&self.root)
    }

    pub fn index_path(&self) -> PathBuf {
        index_path(&self.root)
    }

    pub fn resolution_path(&self, id: &str) -> PathBuf {
        resolution_path(&self.root, id)
    }

    /// Take the project's exclusive merge lock. The retrieval read path must
    /// never call this.
    pub fn lock(&self) -> Result<StoreLock> {
        StoreLock::acquire(&lock_path(&self.root), LOCK_ATTEMPTS, LOCK_RETRY_DELAY)
    }

    /// `Ok(None)` when no index has been created yet; `Corrupt` when one
    /// exists but does not parse.
    pub fn load_index(&self) -> Result<Option<ContextIndex>> {
        let path = self.index_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let index: ContextIndex = serde_json::from_str(&raw)
            .map_err(|err| StoreError::Corrupt(format!("{}: {err}", path.display())))?;
        Ok(Some(index))
    }

    /// `Ok(None)` when the id has no file; `Corrupt` when the file exists but
    /// does not parse.
    pub fn load_resolution(&self, id: &str) -> Result<Option<Resolution>> {
        let path = self.resolution_path(id);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let resolution: Resolution = serde_json::from_str(&raw)
            .map_err(|err| StoreError::Corrupt(format!("{}: {err}", path.display())))?;
        Ok(Some(resolution))
    }

    /// Ids of all resolution files currently on disk, sorted by number.
    /// Tmp files and foreign names are ignored.
    pub fn list_resolution_ids(&self) -> Result<Vec<String>> {
        let dir = resolutions_dir(&self.root);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut numbers: Vec<u32> = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(n) = paths::parse_resolution_file_name(name) {
                    numbers.push(n);
                }
            }
        }
        numbers.sort_unstable();
        Ok(numbers.into_iter().map(paths::format_resolution_id).collect())
    }

    /// Next free identifier: one past the highest number seen in either the
    /// resolutions directory or the index refs. Ids are never reused, even
    /// when an orphan file or a hand-edited index leaves gaps.
    pub fn next_resolution_id(&self, index: &ContextIndex) -> Result<String> {
        let mut highest = 0u32;
        for id in self.list_resolution_ids()? {
            if let Some(n) = paths::parse_resolution_id(&id) {
                highest = highest.max(n);
            }
        }
        for r in &index.resolutions {
            if let Some(n) = paths::parse_resolution_id(&r.id) {
                highest = highest.max(n);
            }
        }
        Ok(paths::format_resolution_id(highest + 1))
    }
}

/// Write-then-rename so readers only ever observe a complete file. Tmp names
/// are dot-prefixed and pid-suffixed; readers skip them.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::Corrupt(format!("{}: no parent directory", path.display())))?;
    std::fs::create_dir_all(parent)?;

    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|s| s.to_str()).unwrap_or("file"),
        std::process::id()
    ));

    let write = (|| -> Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    })();
    if let Err(err) = write {
        let _ = std::fs::remove_file(&tmp);
        return Err(err);
    }

    if let Err(err) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn load_index_absent_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = KnowledgeStore::for_project_root(dir.path());
        assert!(store.load_index().expect("load").is_none());
    }

    #[test]
    fn load_index_corrupt_is_error_not_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = KnowledgeStore::for_project_root(dir.path());
        std::fs::create_dir_all(store.context_dir()).expect("mkdir");
        std::fs::write(store.index_path(), b"{ not json").expect("write");

        let err = store.load_index().err().expect("must be corrupt");
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn list_resolution_ids_skips_tmp_and_foreign_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = KnowledgeStore::for_project_root(dir.path());
        let res_dir = resolutions_dir(store.root());
        std::fs::create_dir_all(&res_dir).expect("mkdir");
        std::fs::write(res_dir.join("res-002.json"), b"{}").expect("write");
        std::fs::write(res_dir.join("res-001.json"), b"{}").expect("write");
        std::fs::write(res_dir.join(".res-003.json.tmp-42"), b"{}").expect("write");
        std::fs::write(res_dir.join("notes.txt"), b"x").expect("write");

        assert_eq!(
            store.list_resolution_ids().expect("list"),
            vec!["res-001".to_string(), "res-002".to_string()]
        );
    }

    #[test]
    fn next_id_covers_both_disk_and_index_refs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = KnowledgeStore::for_project_root(dir.path());
        let res_dir = resolutions_dir(store.root());
        std::fs::create_dir_all(&res_dir).expect("mkdir");
        // Orphan file with a higher number than anything in the index.
        std::fs::write(res_dir.join("res-005.json"), b"{}").expect("write");

        let mut index = ContextIndex::new();
        index.resolutions.push(recall_protocol::ResolutionRef {
            id: "res-002".to_string(),
            problem_signature: "sig".to_string(),
            short_title: "t".to_string(),
            tags: vec![],
            artifacts_touched: vec![],
        });

        assert_eq!(store.next_resolution_id(&index).expect("next"), "res-006");
    }

    #[test]
    fn write_atomic_replaces_content_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("index.json");
        write_atomic(&path, b"one").expect("write");
        write_atomic(&path, b"two").expect("rewrite");
        assert_eq!(std::fs::read(&path).expect("read"), b"two");
        // No tmp debris after successful writes.
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .map(|e| e.expect("entry").file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}
