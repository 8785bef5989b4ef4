//! Cross-invocation key/value state
//!
//! The checkout path is written here right after creation so that a later,
//! independent cleanup invocation can find and remove it even when the main
//! process was killed.

use crate::errors::{FlakeDiffError, Result};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key under which the checkout path is persisted
pub const WORKTREE_PATH_KEY: &str = "worktreePath";

/// Durable state shared between the main run and the cleanup run
pub trait StateStore: Send + Sync {
    fn save(&self, key: &str, value: &str) -> Result<()>;

    fn load(&self, key: &str) -> Option<String>;
}

/// Host-runner state: written to the `GITHUB_STATE` file, read back from
/// `STATE_<key>` in the post step
#[derive(Debug, Clone)]
pub struct GithubStateStore {
    state_file: Option<PathBuf>,
}

impl GithubStateStore {
    pub fn new(state_file: Option<PathBuf>) -> Self {
        Self { state_file }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var_os("GITHUB_STATE").map(PathBuf::from))
    }
}

impl StateStore for GithubStateStore {
    fn save(&self, key: &str, value: &str) -> Result<()> {
        if value.contains('\n') {
            return Err(FlakeDiffError::invalid_config(
                key,
                "state values must be single-line",
            ));
        }
        let Some(path) = &self.state_file else {
            tracing::warn!(key, "GITHUB_STATE is not set; state not persisted");
            return Ok(());
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| FlakeDiffError::io("open_state_file", &e))?;
        writeln!(file, "{}={}", key, value).map_err(|e| FlakeDiffError::io("write_state", &e))
    }

    fn load(&self, key: &str) -> Option<String> {
        std::env::var(format!("STATE_{}", key))
            .ok()
            .filter(|v| !v.is_empty())
    }
}

/// JSON-object file store for running outside the host runner
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> BTreeMap<String, String> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }
}

impl StateStore for FileStateStore {
    fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all();
        entries.insert(key.to_string(), value.to_string());
        let encoded = serde_json::to_vec_pretty(&entries)?;
        atomic_write(&self.path, &encoded)
    }

    fn load(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| FlakeDiffError::Io {
                operation: "save_state".to_string(),
                message: "state lock poisoned".to_string(),
            })?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

/// Write through a sibling temp file and rename, so readers never see a
/// partial file
fn atomic_write(target_path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| FlakeDiffError::io("create_state_dir", &e))?;
        }
    }
    let temp_path = target_path.with_extension("tmp");
    fs::write(&temp_path, content).map_err(|e| FlakeDiffError::io("write_state_temp", &e))?;
    fs::rename(&temp_path, target_path).map_err(|e| FlakeDiffError::io("rename_state_temp", &e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_github_state_appends_key_value_lines() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("state");
        let store = GithubStateStore::new(Some(file.clone()));

        store.save(WORKTREE_PATH_KEY, "/tmp/a").unwrap();
        store.save("other", "1").unwrap();

        let content = fs::read_to_string(&file).unwrap();
        assert_eq!(content, "worktreePath=/tmp/a\nother=1\n");
    }

    #[test]
    fn test_github_state_rejects_multiline_values() {
        let store = GithubStateStore::new(None);
        assert!(store.save("k", "a\nb").is_err());
    }

    #[test]
    fn test_file_state_survives_new_instance() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("nested").join("state.json");

        FileStateStore::new(&file)
            .save(WORKTREE_PATH_KEY, "/tmp/wt")
            .unwrap();

        let reopened = FileStateStore::new(&file);
        assert_eq!(reopened.load(WORKTREE_PATH_KEY).as_deref(), Some("/tmp/wt"));
        assert_eq!(reopened.load("missing"), None);
        assert!(!file.with_extension("tmp").exists());
    }

    #[test]
    fn test_memory_state_overwrites() {
        let store = MemoryStateStore::new();
        store.save("k", "1").unwrap();
        store.save("k", "2").unwrap();
        assert_eq!(store.load("k").as_deref(), Some("2"));
    }
}
