//! Comment command
//!
//! Usage: flakediff comment [RESULTS]
//!
//! Posts the report for results handed off by one or more diff jobs. Token
//! and strategy come from the action inputs.

use clap::Args;
use flakediff_core::config::{EnvInputs, InputSource};
use flakediff_core::handoff::read_results;
use flakediff_core::report::{format_report, report_marker, OverflowLink, ReportOptions};
use flakediff_core::{
    publish_report, ActionConfig, DiffResult, GithubCommentClient, HostContext, PublishOutcome,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct CommentArgs {
    /// Results file or directory (default: the `results-path` input)
    pub results: Option<PathBuf>,
}

/// Inputs with `mode` pinned, so comment-only validation applies
struct CommentModeInputs<'a>(&'a dyn InputSource);

impl InputSource for CommentModeInputs<'_> {
    fn get(&self, name: &str) -> Option<String> {
        if name == "mode" {
            Some("comment".to_string())
        } else {
            self.0.get(name)
        }
    }
}

pub async fn execute(args: CommentArgs) -> Result<(), Box<dyn std::error::Error>> {
    let host = HostContext::from_env()?;
    let config = ActionConfig::from_inputs(&CommentModeInputs(&EnvInputs), &host.workspace)?;
    let results_path = args
        .results
        .unwrap_or_else(|| host.workspace.join(&config.results_path));
    post_from_file(&config, &host, &results_path).await
}

/// Read handed-off results and post their report
pub(crate) async fn post_from_file(
    config: &ActionConfig,
    host: &HostContext,
    results_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let pr = host.pull_request()?;
    let results = read_results(results_path)?;
    let commit = results
        .iter()
        .map(|r| r.pr_ref.as_str())
        .find(|sha| !sha.is_empty())
        .unwrap_or(pr.head_sha.as_str())
        .to_string();
    post(config, host, pr.number, &commit, &results).await
}

/// Format `results` and publish them on pull request `pr_number`
pub(crate) async fn post(
    config: &ActionConfig,
    host: &HostContext,
    pr_number: u64,
    commit: &str,
    results: &[DiffResult],
) -> Result<(), Box<dyn std::error::Error>> {
    let options = ReportOptions {
        overflow: config.overflow_storage.then(|| OverflowLink {
            repository_url: host.repository_url(),
            run_id: host.run_id.clone(),
        }),
        ..ReportOptions::default()
    };
    let body = format_report(results, commit, &options);

    let client = GithubCommentClient::new(
        host.api_url.as_str(),
        host.repository.as_str(),
        config.github_token.clone(),
    )?;
    let outcome = publish_report(
        &client,
        pr_number,
        &body,
        config.comment_strategy,
        &report_marker(results),
    )
    .await?;

    match outcome {
        PublishOutcome::Created(id) => println!("✓ Posted comment {}", id),
        PublishOutcome::Updated(id) => println!("✓ Updated comment {}", id),
        PublishOutcome::Unchanged(id) => println!("✓ Comment {} already up to date", id),
    }
    Ok(())
}
