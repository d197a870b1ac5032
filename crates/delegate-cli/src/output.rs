use delegate_core::git::CommitOutcome;
use delegate_core::RunSummary;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_summary(summary: &RunSummary) {
    print!("{}", format_summary(summary));
}

/// One `label: value` line per field, values aligned after the longest label.
fn format_summary(summary: &RunSummary) -> String {
    let fields = [
        ("branch", summary.branch.as_str()),
        ("changes", outcome_label(summary.first_commit)),
        ("review", outcome_label(summary.review_commit)),
        ("pull request", summary.pr_url.as_deref().unwrap_or("-")),
        ("assignee", summary.assignee.as_deref().unwrap_or("-")),
    ];
    let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;
    fields
        .iter()
        .map(|(label, value)| format!("{:width$} {value}\n", format!("{label}:")))
        .collect()
}

fn outcome_label(outcome: CommitOutcome) -> &'static str {
    match outcome {
        CommitOutcome::Committed => "committed and pushed",
        CommitOutcome::NoChanges => "no changes",
        CommitOutcome::Failed => "failed",
    }
}
