//! Report aggregation
//!
//! Packs any number of diff results into one comment body that stays below
//! the host's comment size ceiling. The diff budget is split evenly across
//! results, so one huge diff cannot starve the others. Lengths are counted
//! in characters.

use crate::checkout::sanitize_ref;
use crate::model::DiffResult;

/// Hard ceiling of a pull request comment body
pub const MAX_COMMENT_LENGTH: usize = 65536;

/// Characters available to diff bodies across all results
pub const DEFAULT_DIFF_BUDGET: usize = 60000;

/// Marker of a report aggregating several targets
pub const GENERIC_MARKER: &str = "<!-- flakediff -->";

const COMMIT_MARKER_PREFIX: &str = "<!-- flakediff-commit:";
const NO_DIFFERENCES: &str = "No differences found";
/// Longest commit identifier shown in the footer
const MAX_COMMIT_CHARS: usize = 80;

const CLAMP_NOTICE: &str = "\n\n_Report shortened to fit the comment size limit._\n";

/// Where the untruncated results can be downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowLink {
    /// e.g. `https://github.com/owner/repo`
    pub repository_url: String,
    pub run_id: String,
}

impl OverflowLink {
    pub fn url(&self) -> String {
        format!(
            "{}/actions/runs/{}",
            self.repository_url.trim_end_matches('/'),
            self.run_id
        )
    }
}

/// Knobs for [`format_report`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub budget: usize,
    /// Set when the full results were stored somewhere retrievable
    pub overflow: Option<OverflowLink>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            budget: DEFAULT_DIFF_BUDGET,
            overflow: None,
        }
    }
}

/// Identity marker of a report: per-target for a single result, generic
/// otherwise
pub fn report_marker(results: &[DiffResult]) -> String {
    match results {
        [single] => result_marker(&single.display_name),
        _ => GENERIC_MARKER.to_string(),
    }
}

/// Identity marker of a single-target report
pub fn result_marker(display_name: &str) -> String {
    format!("<!-- flakediff:{} -->", sanitize_ref(display_name))
}

/// Hidden marker recording the commit a report was built for
pub fn commit_marker(commit_sha: &str) -> String {
    format!("{}{} -->", COMMIT_MARKER_PREFIX, commit_sha)
}

/// Commit recorded in a report body, if any
pub fn extract_commit(body: &str) -> Option<&str> {
    let start = body.find(COMMIT_MARKER_PREFIX)? + COMMIT_MARKER_PREFIX.len();
    let rest = &body[start..];
    let end = rest.find("-->")?;
    Some(rest[..end].trim())
}

/// Per-result character allowance
pub fn per_result_budget(budget: usize, count: usize) -> usize {
    if count == 0 {
        budget
    } else {
        budget / count
    }
}

/// Cut `diff` to `limit` characters when it is strictly longer
///
/// Returns the text and whether it was cut. The marker records the original
/// length.
pub fn truncate_diff(diff: &str, limit: usize) -> (String, bool) {
    let total = diff.chars().count();
    if total <= limit {
        return (diff.to_string(), false);
    }
    let kept: String = diff.chars().take(limit).collect();
    (
        format!("{}\n... (truncated, {} chars total)", kept, total),
        true,
    )
}

/// Escape a display name for use inside HTML markup
pub fn sanitize_label(display_name: &str) -> String {
    let mut out = String::with_capacity(display_name.len());
    for c in display_name.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\r' | '\n' | '\t' => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

/// Code fence longer than any backtick run in `body`
fn fence_for(body: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in body.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

/// Render `results` as one comment body
///
/// The body carries an identity marker, one collapsible section per result,
/// an optional link to the untruncated output and a footer naming
/// `commit_sha` (cut to its first 80 characters). The returned text stays
/// under [`MAX_COMMENT_LENGTH`] characters.
pub fn format_report(results: &[DiffResult], commit_sha: &str, options: &ReportOptions) -> String {
    let limit = per_result_budget(options.budget, results.len());
    let mut any_truncated = false;

    let mut body = String::new();
    body.push_str(&report_marker(results));
    body.push('\n');
    body.push_str("### Build output diff\n\n");

    for result in results {
        body.push_str("<details>\n<summary>");
        body.push_str(&sanitize_label(&result.display_name));
        body.push_str("</summary>\n\n");

        if result.has_diff() {
            let (text, truncated) = truncate_diff(&result.diff, limit);
            any_truncated |= truncated;
            let fence = fence_for(&text);
            body.push_str(&fence);
            body.push('\n');
            body.push_str(text.trim_end_matches('\n'));
            body.push('\n');
            body.push_str(&fence);
            body.push('\n');
        } else {
            body.push_str(NO_DIFFERENCES);
            body.push('\n');
        }
        body.push_str("\n</details>\n\n");
    }

    if any_truncated {
        if let Some(overflow) = &options.overflow {
            body.push_str(&format!(
                "Some diffs were truncated. The full output is attached to [workflow run {}]({}).\n\n",
                overflow.run_id,
                overflow.url()
            ));
        }
    }

    let commit: String = commit_sha.chars().take(MAX_COMMIT_CHARS).collect();
    let footer = format!(
        "---\n<sub>Compared at commit {}</sub>\n{}\n",
        commit,
        commit_marker(&commit)
    );

    clamp(body, &footer)
}

fn clamp(mut body: String, footer: &str) -> String {
    let footer_len = footer.chars().count();
    if body.chars().count() + footer_len >= MAX_COMMENT_LENGTH {
        let room = (MAX_COMMENT_LENGTH - 1)
            .saturating_sub(footer_len + CLAMP_NOTICE.chars().count());
        body = body.chars().take(room).collect();
        body.push_str(CLAMP_NOTICE);
    }
    body.push_str(footer);
    body
}
