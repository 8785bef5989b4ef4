//! Diff pipeline orchestration
//!
//! One run acquires a base-branch checkout, prefetches flake inputs for both
//! roots, then walks the targets in declaration order. Targets are processed
//! strictly one after another because nix serialises access to its store
//! database and parallel evaluations mostly wait on each other's locks. The
//! base and head resolution of a single target do run concurrently.
//!
//! ## Logging Ownership
//!
//! `pipeline_run` start/end/error events are emitted here; checkout
//! acquisition logs its own lifecycle.

use crate::checkout::CheckoutManager;
use crate::diff_tool::DiffInvoker;
use crate::errors::{FlakeDiffError, Result};
use crate::exec::CommandRunner;
use crate::model::{ComparisonTarget, DiffResult};
use crate::resolver::ArtifactResolver;
use crate::state::StateStore;
use crate::{log_op_end, log_op_error, log_op_start};
use flakediff_core_types::RunId;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Everything one pipeline run needs
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub targets: Vec<ComparisonTarget>,
    /// Realise outputs instead of comparing derivations
    pub build: bool,
    /// Flake directory, absolute or relative to `cwd`
    pub directory: PathBuf,
    pub base_ref: String,
    pub base_sha: String,
    pub head_sha: String,
    /// Root of the live clone
    pub cwd: PathBuf,
    /// Host run identifier, keeps checkout paths of concurrent runs apart
    pub run_id: String,
}

/// Flake roots for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlakeRoots {
    pub base: String,
    pub head: String,
}

impl FlakeRoots {
    /// Base-side reference for an attribute
    pub fn base_reference(&self, attribute_path: &str) -> String {
        format!("{}#{}", self.base, attribute_path)
    }

    /// Head-side reference for an attribute
    pub fn head_reference(&self, attribute_path: &str) -> String {
        format!("{}#{}", self.head, attribute_path)
    }
}

/// Lexically normalise a path: drop `.` and fold `..`
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Compute the base and head flake roots
///
/// The base root is the checkout, extended by the flake directory's path
/// relative to `cwd` only when the two differ.
///
/// # Errors
///
/// `InvalidConfig` when `directory` lies outside `cwd`.
pub fn flake_roots(checkout: &Path, directory: &Path, cwd: &Path) -> Result<FlakeRoots> {
    let cwd = normalize_path(cwd);
    let head = normalize_path(&cwd.join(directory));
    let relative = head.strip_prefix(&cwd).map_err(|_| {
        FlakeDiffError::invalid_config(
            "directory",
            format!("{} is outside {}", head.display(), cwd.display()),
        )
    })?;

    let base = if relative.as_os_str().is_empty() {
        checkout.to_path_buf()
    } else {
        checkout.join(relative)
    };

    Ok(FlakeRoots {
        base: base.to_string_lossy().into_owned(),
        head: head.to_string_lossy().into_owned(),
    })
}

/// Per-run bookkeeping
struct RunScope {
    id: RunId,
    prefetch_warned: AtomicBool,
}

impl RunScope {
    fn new() -> Self {
        Self {
            id: RunId::new(),
            prefetch_warned: AtomicBool::new(false),
        }
    }
}

/// Orchestrates checkout, resolution and diffing for a list of targets
#[derive(Clone)]
pub struct DiffPipeline {
    checkouts: CheckoutManager,
    resolver: ArtifactResolver,
    differ: DiffInvoker,
}

impl DiffPipeline {
    pub fn new(checkouts: CheckoutManager, resolver: ArtifactResolver, differ: DiffInvoker) -> Self {
        Self {
            checkouts,
            resolver,
            differ,
        }
    }

    /// Wire every component to the same runner
    pub fn from_runner(
        runner: Arc<dyn CommandRunner>,
        state: Arc<dyn StateStore>,
        repo_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::new(
            CheckoutManager::new(runner.clone(), state, repo_dir),
            ArtifactResolver::new(runner.clone()),
            DiffInvoker::new(runner),
        )
    }

    pub fn checkouts(&self) -> &CheckoutManager {
        &self.checkouts
    }

    /// Diff every target between base and head
    ///
    /// Returns one result per target, in target order. The first failure
    /// aborts the remaining targets; the checkout is released either way.
    ///
    /// # Errors
    ///
    /// `GitWorktree`, `Build`, `PathInfo`, `DiffTool` or `InvalidConfig`
    /// from the failing step.
    pub async fn run(&self, request: &PipelineRequest) -> Result<Vec<DiffResult>> {
        let scope = RunScope::new();
        log_op_start!(
            "pipeline_run",
            run_id = %scope.id,
            base_ref = %request.base_ref,
            target_count = request.targets.len() as u64
        );
        let start = std::time::Instant::now();

        let result = self.run_impl(request, &scope).await;

        match &result {
            Ok(results) => {
                log_op_end!(
                    "pipeline_run",
                    duration_ms = start.elapsed().as_millis() as u64,
                    run_id = %scope.id,
                    target_count = results.len() as u64
                );
            }
            Err(e) => {
                log_op_error!(
                    "pipeline_run",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    run_id = %scope.id
                );
            }
        }
        result
    }

    async fn run_impl(&self, request: &PipelineRequest, scope: &RunScope) -> Result<Vec<DiffResult>> {
        let guard = self
            .checkouts
            .acquire(&request.base_ref, &request.run_id)
            .await?;

        let result = self.diff_targets(request, guard.path(), scope).await;

        guard.release().await;
        result
    }

    async fn diff_targets(
        &self,
        request: &PipelineRequest,
        checkout: &Path,
        scope: &RunScope,
    ) -> Result<Vec<DiffResult>> {
        let roots = flake_roots(checkout, &request.directory, &request.cwd)?;

        tokio::join!(
            self.prefetch(&roots.base, scope),
            self.prefetch(&roots.head, scope)
        );

        let mut results = Vec::with_capacity(request.targets.len());
        for target in &request.targets {
            tracing::info!(
                run_id = %scope.id,
                display_name = %target.display_name,
                "diffing target"
            );
            let base_reference = roots.base_reference(&target.attribute_path);
            let head_reference = roots.head_reference(&target.attribute_path);

            let (base, head) = tokio::try_join!(
                self.resolver.resolve(&base_reference, request.build),
                self.resolver.resolve(&head_reference, request.build)
            )?;

            let diff = self.differ.diff(&base.path, &head.path, checkout).await?;

            results.push(DiffResult {
                display_name: target.display_name.clone(),
                attribute_path: target.attribute_path.clone(),
                base_ref: request.base_sha.clone(),
                pr_ref: request.head_sha.clone(),
                diff,
            });
        }
        Ok(results)
    }

    async fn prefetch(&self, root: &str, scope: &RunScope) {
        if let Err(reason) = self.resolver.prefetch(root).await {
            if !scope.prefetch_warned.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    run_id = %scope.id,
                    root,
                    reason = %reason,
                    "input prefetch failed; continuing without it"
                );
            } else {
                tracing::debug!(run_id = %scope.id, root, "input prefetch failed");
            }
        }
    }
}
