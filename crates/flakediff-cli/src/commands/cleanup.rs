//! Cleanup command
//!
//! Usage: flakediff cleanup [--repo <DIR>] [--state-file <FILE>]
//!
//! Runs as the action's post step. Never fails.

use clap::Args;
use flakediff_core::{CheckoutManager, SystemRunner};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Clone the checkout was attached to (default: current directory)
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Read the recorded checkout from this JSON file instead of the runner state
    #[arg(long)]
    pub state_file: Option<PathBuf>,
}

pub async fn execute(args: CleanupArgs) -> Result<(), Box<dyn std::error::Error>> {
    let manager = CheckoutManager::new(
        Arc::new(SystemRunner),
        super::state_store(args.state_file),
        args.repo,
    );
    manager.cleanup_from_state().await;
    Ok(())
}
