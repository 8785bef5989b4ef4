//! Base-branch checkout lifecycle
//!
//! The base ref is materialized as a detached `git worktree` under the
//! system temp directory. [`CheckoutManager::acquire`] hands out a
//! [`CheckoutGuard`]; the guard removes the worktree exactly once, either
//! through [`CheckoutGuard::release`] or, if it is dropped first (error
//! unwinding, cancelled future), synchronously from `Drop`.
//!
//! ## Logging Ownership
//!
//! Acquisition and standalone cleanup own lifecycle logging. Release only
//! warns, since it runs while something else is already being reported.

use crate::errors::{FlakeDiffError, Result};
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::model::Checkout;
use crate::state::{StateStore, WORKTREE_PATH_KEY};
use crate::{log_op_end, log_op_error, log_op_start};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CHECKOUT_PREFIX: &str = "flakediff";

/// Replace every character outside `[A-Za-z0-9-]` with `-`
pub fn sanitize_ref(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// System temp directory with symlinks resolved
///
/// Some nix versions refuse flake paths that pass through a symlink (macOS
/// `/var` -> `/private/var`).
pub fn canonical_temp_root() -> PathBuf {
    let temp = std::env::temp_dir();
    std::fs::canonicalize(&temp).unwrap_or(temp)
}

/// Checkout directory for a base ref and run id under `temp_root`
pub fn checkout_path(temp_root: &Path, base_ref: &str, run_id: &str) -> PathBuf {
    temp_root.join(format!(
        "{}-{}-{}",
        CHECKOUT_PREFIX,
        sanitize_ref(base_ref),
        sanitize_ref(run_id)
    ))
}

/// Creates and removes base-branch worktrees
#[derive(Clone)]
pub struct CheckoutManager {
    remover: WorktreeRemover,
    state: Arc<dyn StateStore>,
    temp_root: PathBuf,
    remote: String,
}

impl CheckoutManager {
    /// `repo_dir` is the clone the worktree is attached to
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        state: Arc<dyn StateStore>,
        repo_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            remover: WorktreeRemover {
                runner,
                repo_dir: repo_dir.into(),
            },
            state,
            temp_root: canonical_temp_root(),
            remote: "origin".to_string(),
        }
    }

    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn path_for(&self, base_ref: &str, run_id: &str) -> PathBuf {
        checkout_path(&self.temp_root, base_ref, run_id)
    }

    /// Fetch `base_ref` shallowly and check it out detached
    ///
    /// # Errors
    ///
    /// `GitWorktree` when the fetch or the worktree creation fails. A stale
    /// checkout at the target path is removed first; failing to do so is
    /// only logged.
    pub async fn acquire(&self, base_ref: &str, run_id: &str) -> Result<CheckoutGuard> {
        log_op_start!("checkout_acquire", base_ref = base_ref);
        let start = std::time::Instant::now();

        let checkout = self.acquire_impl(base_ref, run_id).await.map_err(|e| {
            log_op_error!(
                "checkout_acquire",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                base_ref = base_ref
            );
            e
        })?;

        log_op_end!(
            "checkout_acquire",
            duration_ms = start.elapsed().as_millis() as u64,
            checkout_path = %checkout.path.display()
        );

        Ok(CheckoutGuard {
            checkout,
            remover: self.remover.clone(),
            released: false,
        })
    }

    async fn acquire_impl(&self, base_ref: &str, run_id: &str) -> Result<Checkout> {
        let path = self.path_for(base_ref, run_id);

        self.remove_stale(&path).await;

        let fetch = CommandSpec::new("git")
            .args(["fetch", "--depth=1", "--no-tags"])
            .arg(self.remote.as_str())
            .arg(base_ref)
            .current_dir(&self.remover.repo_dir);
        self.git_checked("fetch", &fetch).await?;

        let add = CommandSpec::new("git")
            .args(["worktree", "add", "--detach"])
            .arg(path.to_string_lossy())
            .arg("FETCH_HEAD")
            .current_dir(&self.remover.repo_dir);
        self.git_checked("add", &add).await?;

        if let Err(e) = self
            .state
            .save(WORKTREE_PATH_KEY, &path.to_string_lossy())
        {
            tracing::warn!(error = %e, "could not persist checkout path for post-run cleanup");
        }

        Ok(Checkout {
            path,
            base_ref: base_ref.to_string(),
        })
    }

    async fn remove_stale(&self, path: &Path) {
        self.remover.release(path).await;
        if path.exists() {
            tracing::info!(path = %path.display(), "removing leftover checkout directory");
            if let Err(e) = tokio::fs::remove_dir_all(path).await {
                tracing::warn!(path = %path.display(), error = %e, "pre-cleanup failed, continuing");
            }
        }
    }

    async fn git_checked(&self, operation: &str, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self
            .remover
            .runner
            .run(spec)
            .await
            .map_err(|e| FlakeDiffError::GitWorktree {
                operation: operation.to_string(),
                message: e.to_string(),
            })?;
        if !output.success() {
            return Err(FlakeDiffError::GitWorktree {
                operation: operation.to_string(),
                message: output.failure_message(),
            });
        }
        Ok(output)
    }

    /// Whether git still has a worktree registered at `path`
    pub async fn exists(&self, path: &Path) -> bool {
        self.remover.exists(path).await
    }

    /// Remove the worktree at `path` if git still knows it. Never fails.
    pub async fn release(&self, path: &Path) {
        self.remover.release(path).await;
    }

    /// Post-run cleanup: remove the checkout recorded in persisted state
    ///
    /// Meant for a separate invocation after the main run ended (timeout,
    /// cancellation). Idempotent; never fails.
    pub async fn cleanup_from_state(&self) {
        log_op_start!("checkout_cleanup");
        let start = std::time::Instant::now();

        match self.state.load(WORKTREE_PATH_KEY) {
            Some(path) => {
                tracing::info!(checkout_path = %path, "releasing recorded checkout");
                self.remover.release(Path::new(&path)).await;
            }
            None => tracing::info!("no checkout recorded, nothing to clean up"),
        }

        log_op_end!(
            "checkout_cleanup",
            duration_ms = start.elapsed().as_millis() as u64
        );
    }
}

/// Scoped ownership of an acquired checkout
///
/// Dropping the guard without calling [`CheckoutGuard::release`] removes
/// the worktree with blocking commands.
pub struct CheckoutGuard {
    checkout: Checkout,
    remover: WorktreeRemover,
    released: bool,
}

impl CheckoutGuard {
    pub fn checkout(&self) -> &Checkout {
        &self.checkout
    }

    pub fn path(&self) -> &Path {
        &self.checkout.path
    }

    /// Remove the worktree. Never fails.
    pub async fn release(mut self) {
        self.remover.release(&self.checkout.path).await;
        self.released = true;
    }
}

impl std::fmt::Debug for CheckoutGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutGuard")
            .field("checkout", &self.checkout)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for CheckoutGuard {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            tracing::debug!(path = %self.checkout.path.display(), "releasing checkout from drop");
            self.remover.release_blocking(&self.checkout.path);
        }
    }
}

#[derive(Clone)]
struct WorktreeRemover {
    runner: Arc<dyn CommandRunner>,
    repo_dir: PathBuf,
}

impl WorktreeRemover {
    fn list_spec(&self) -> CommandSpec {
        CommandSpec::new("git")
            .args(["worktree", "list", "--porcelain"])
            .current_dir(&self.repo_dir)
    }

    fn remove_spec(&self, path: &Path) -> CommandSpec {
        CommandSpec::new("git")
            .args(["worktree", "remove", "--force"])
            .arg(path.to_string_lossy())
            .current_dir(&self.repo_dir)
    }

    async fn exists(&self, path: &Path) -> bool {
        match self.runner.run(&self.list_spec()).await {
            Ok(output) => probe_result(output, path),
            Err(e) => {
                tracing::debug!(error = %e, "worktree probe failed, assuming absent");
                false
            }
        }
    }

    fn exists_blocking(&self, path: &Path) -> bool {
        match self.runner.run_blocking(&self.list_spec()) {
            Ok(output) => probe_result(output, path),
            Err(e) => {
                tracing::debug!(error = %e, "worktree probe failed, assuming absent");
                false
            }
        }
    }

    async fn release(&self, path: &Path) {
        if !self.exists(path).await {
            return;
        }
        let result = self.runner.run(&self.remove_spec(path)).await;
        report_removal(path, result);
    }

    fn release_blocking(&self, path: &Path) {
        if !self.exists_blocking(path) {
            return;
        }
        let result = self.runner.run_blocking(&self.remove_spec(path));
        report_removal(path, result);
    }
}

fn probe_result(output: CommandOutput, path: &Path) -> bool {
    if !output.success() {
        tracing::debug!(stderr = %output.stderr.trim(), "worktree probe failed, assuming absent");
        return false;
    }
    worktree_listed(&output.stdout, path)
}

/// Whether `git worktree list --porcelain` output names `path`
pub fn worktree_listed(porcelain: &str, path: &Path) -> bool {
    porcelain
        .lines()
        .filter_map(|line| line.strip_prefix("worktree "))
        .any(|listed| Path::new(listed.trim()) == path)
}

fn report_removal(path: &Path, result: std::io::Result<CommandOutput>) {
    match result {
        Ok(output) if output.success() => {
            tracing::info!(checkout_path = %path.display(), "checkout removed");
        }
        Ok(output) => tracing::warn!(
            checkout_path = %path.display(),
            error = %output.failure_message(),
            "failed to remove checkout"
        ),
        Err(e) => tracing::warn!(
            checkout_path = %path.display(),
            error = %e,
            "failed to remove checkout"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_replaces_slashes_and_dots() {
        assert_eq!(sanitize_ref("release/24.05"), "release-24-05");
        assert_eq!(sanitize_ref("feature/ü-x"), "feature---x");
        assert_eq!(sanitize_ref("main"), "main");
    }

    #[test]
    fn test_checkout_path_layout() {
        let path = checkout_path(Path::new("/tmp"), "release/1.0", "123");
        assert_eq!(path, PathBuf::from("/tmp/flakediff-release-1-0-123"));
    }

    #[test]
    fn test_worktree_listed_matches_exact_path() {
        let porcelain = "worktree /repo\nHEAD abc\nbranch refs/heads/main\n\n\
                         worktree /tmp/flakediff-main-1\nHEAD def\ndetached\n";
        assert!(worktree_listed(porcelain, Path::new("/tmp/flakediff-main-1")));
        assert!(!worktree_listed(porcelain, Path::new("/tmp/flakediff-main")));
        assert!(!worktree_listed("", Path::new("/repo")));
    }

    proptest! {
        #[test]
        fn prop_sanitized_ref_uses_allowed_alphabet(base_ref in ".*", run_id in "[0-9]{1,10}") {
            let sanitized = sanitize_ref(&base_ref);
            prop_assert!(sanitized.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
            prop_assert_eq!(sanitized.chars().count(), base_ref.chars().count());

            let a = checkout_path(Path::new("/t"), &base_ref, &run_id);
            let b = checkout_path(Path::new("/t"), &base_ref, &run_id);
            prop_assert_eq!(&a, &b);
            let name = a.file_name().unwrap().to_string_lossy().into_owned();
            prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
        }
    }
}
