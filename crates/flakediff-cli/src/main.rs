//! flakediff CLI
//!
//! Compares a pull request's flake outputs against its base branch and
//! reports the differences as a pull request comment.

use clap::{Parser, Subcommand};
use flakediff_core::errors::ExError;
use flakediff_core::logging_facility::{self, Profile};
use flakediff_core::FlakeDiffError;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "flakediff")]
#[command(about = "flakediff - Build-output diffs for pull requests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the action as configured by its inputs (full, diff or comment mode)
    Run(commands::run::RunArgs),
    /// Remove the checkout recorded by an earlier run
    Cleanup(commands::cleanup::CleanupArgs),
    /// Print the report for a results file
    Report(commands::report::ReportArgs),
    /// Post the report for handed-off results
    Comment(commands::comment::CommentArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging_facility::init(Profile::from_env());

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Cleanup(args) => commands::cleanup::execute(args).await,
        Commands::Report(args) => commands::report::execute(args),
        Commands::Comment(args) => commands::comment::execute(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", describe(e.as_ref()));
        std::process::exit(1);
    }
}

/// Top-level message; pipeline failures lead with their stable code
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    match err.downcast_ref::<FlakeDiffError>() {
        Some(e) => ExError::from(e.clone()).to_string(),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_leads_with_error_code() {
        let err: Box<dyn std::error::Error> = Box::new(FlakeDiffError::GitWorktree {
            operation: "worktree_add".to_string(),
            message: "fatal: already exists".to_string(),
        });

        let text = describe(err.as_ref());

        assert!(text.starts_with("[ERR_GIT_WORKTREE]"), "{}", text);
        assert!(text.contains("fatal: already exists"));
    }

    #[test]
    fn test_describe_passes_other_errors_through() {
        let err: Box<dyn std::error::Error> = "interrupted by SIGTERM".into();
        assert_eq!(describe(err.as_ref()), "interrupted by SIGTERM");
    }
}
