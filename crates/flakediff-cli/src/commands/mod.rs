pub mod cleanup;
pub mod comment;
pub mod report;
pub mod run;

use flakediff_core::state::{FileStateStore, GithubStateStore, StateStore};
use std::path::PathBuf;
use std::sync::Arc;

/// State store for the cleanup handoff: an explicit file, else the runner's
fn state_store(state_file: Option<PathBuf>) -> Arc<dyn StateStore> {
    match state_file {
        Some(path) => Arc::new(FileStateStore::new(path)),
        None => Arc::new(GithubStateStore::from_env()),
    }
}
