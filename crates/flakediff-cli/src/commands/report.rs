//! Report command
//!
//! Usage: flakediff report <RESULTS> [--commit <SHA>] [--budget <CHARS>] [--output <FILE>]

use clap::Args;
use flakediff_core::handoff::read_results;
use flakediff_core::report::{format_report, ReportOptions, DEFAULT_DIFF_BUDGET};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Results file, or a directory of results files
    pub results: PathBuf,

    /// Commit named in the footer (default: head commit recorded in the results)
    #[arg(long)]
    pub commit: Option<String>,

    /// Characters shared by all diff bodies
    #[arg(long, default_value_t = DEFAULT_DIFF_BUDGET)]
    pub budget: usize,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: ReportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let results = read_results(&args.results)?;
    let commit = args
        .commit
        .or_else(|| {
            results
                .iter()
                .map(|r| r.pr_ref.clone())
                .find(|sha| !sha.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let options = ReportOptions {
        budget: args.budget,
        overflow: None,
    };
    let body = format_report(&results, &commit, &options);

    if let Some(output_path) = args.output {
        std::fs::write(&output_path, body)?;
        println!("✓ Report written to {}", output_path.display());
    } else {
        print!("{}", body);
    }

    Ok(())
}
