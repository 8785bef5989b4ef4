//! Run command
//!
//! Usage: flakediff run [--repo <DIR>] [--state-file <FILE>]
//!
//! Entry point of the action. Reads `INPUT_*` and `GITHUB_*` from the
//! environment; `mode` selects between diffing, commenting, or both.

use clap::Args;
use flakediff_core::config::{EnvInputs, Mode};
use flakediff_core::filters::reportable_diff;
use flakediff_core::handoff::{write_output, write_results};
use flakediff_core::{
    log_op_end, log_op_error, log_op_start, ActionConfig, DiffPipeline, DiffResult,
    FlakeDiffError, HostContext, PipelineRequest, SystemRunner,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Repository clone (default: GITHUB_WORKSPACE, else current directory)
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// Persist cleanup state in this JSON file instead of the runner state
    #[arg(long)]
    pub state_file: Option<PathBuf>,
}

pub async fn execute(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut host = HostContext::from_env()?;
    if let Some(repo) = args.repo {
        host.workspace = repo;
    }
    let config = ActionConfig::from_inputs(&EnvInputs, &host.workspace)?;

    if config.mode == Mode::Comment {
        let results_path = host.workspace.join(&config.results_path);
        return super::comment::post_from_file(&config, &host, &results_path).await;
    }

    tokio::select! {
        result = diff(&config, &host, args.state_file) => result,
        signal = shutdown_signal() => {
            tracing::warn!(signal, "interrupted, releasing checkout");
            Err(format!("interrupted by {}", signal).into())
        }
    }
}

/// Diff every target, hand the results off and, in full mode, comment
async fn diff(
    config: &ActionConfig,
    host: &HostContext,
    state_file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pr = host.pull_request()?;
    let pipeline = DiffPipeline::from_runner(
        Arc::new(SystemRunner),
        super::state_store(state_file),
        &host.workspace,
    );
    let request = PipelineRequest {
        targets: config.attributes.clone(),
        build: config.build,
        directory: config.directory.clone(),
        base_ref: pr.base_ref.clone(),
        base_sha: pr.base_sha.clone(),
        head_sha: pr.head_sha.clone(),
        cwd: host.workspace.clone(),
        run_id: host.run_id.clone(),
    };

    let results = pipeline.run(&request).await?;
    let results = refine(results, config.suppress_minor_updates);
    let has_changes = results.iter().any(DiffResult::has_diff);

    let results_path = host.workspace.join(&config.results_path);
    hand_off(&results, &results_path, has_changes)?;

    if config.mode == Mode::Full {
        super::comment::post(config, host, pr.number, &pr.head_sha, &results).await?;
    }
    Ok(())
}

/// Blank unchanged diffs and apply the minor-update filter
fn refine(results: Vec<DiffResult>, suppress_minor: bool) -> Vec<DiffResult> {
    results
        .into_iter()
        .map(|mut result| {
            result.diff = reportable_diff(&result.diff, suppress_minor);
            result
        })
        .collect()
}

fn hand_off(
    results: &[DiffResult],
    results_path: &std::path::Path,
    has_changes: bool,
) -> Result<(), FlakeDiffError> {
    log_op_start!("results_handoff", result_count = results.len() as u64);
    let start = Instant::now();

    let outcome = write_results(results_path, results).and_then(|()| {
        let output_file = std::env::var_os("GITHUB_OUTPUT").map(PathBuf::from);
        write_output(
            output_file.as_deref(),
            "results-path",
            &results_path.to_string_lossy(),
        )?;
        write_output(
            output_file.as_deref(),
            "has-changes",
            if has_changes { "true" } else { "false" },
        )
    });

    match &outcome {
        Ok(()) => {
            log_op_end!(
                "results_handoff",
                duration_ms = start.elapsed().as_millis() as u64,
                has_changes
            );
        }
        Err(e) => {
            log_op_error!(
                "results_handoff",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
        }
    }
    outcome
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = term.recv() => "SIGTERM",
        },
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "Ctrl-C"
}
