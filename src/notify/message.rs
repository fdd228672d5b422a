//! Status message composition.
//!
//! One line per notification: leading emoji, bold pipeline name, timestamp,
//! then ` | `-separated fragments. Discord renders `**…**` as bold. Metric
//! fragments are simply omitted when the step reported nothing.

use crate::models::{RunSummary, Severity, StepOutcome};
use chrono::Local;
use std::path::Path;

const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Trailing fragment of every success message.
pub const COMPLETION_MARKER: &str = "Completed";

fn header(severity: Severity, pipeline: &str, step: Option<&str>) -> String {
    let ts = Local::now().format(TIMESTAMP_FMT);
    match step {
        Some(step) => format!("{} **{} / {}** ({})", severity.emoji(), pipeline, step, ts),
        None => format!("{} **{}** ({})", severity.emoji(), pipeline, ts),
    }
}

pub fn step_success(pipeline: &str, outcome: &StepOutcome) -> String {
    let mut parts = vec![header(Severity::Success, pipeline, Some(&outcome.step))];
    if let Some(n) = outcome.metrics.total_records {
        parts.push(format!("Total records: {}", n));
    }
    if let Some(n) = outcome.metrics.successful {
        parts.push(format!("Successful: {}", n));
    }
    parts.push(COMPLETION_MARKER.to_string());
    parts.join(" | ")
}

pub fn step_failure(pipeline: &str, outcome: &StepOutcome, log_file: Option<&Path>) -> String {
    let mut parts = vec![header(Severity::Failure, pipeline, Some(&outcome.step))];
    parts.push(format!("Exit code: {}", outcome.exit_code));
    if let Some(log) = log_file {
        parts.push(format!("See {}", log.display()));
    }
    parts.join(" | ")
}

/// Roll-up for a multi-step run that kept going past failures.
pub fn run_summary(pipeline: &str, summary: &RunSummary) -> String {
    let failed = summary.failed_count();
    let severity = if failed == 0 {
        Severity::Success
    } else {
        Severity::Warning
    };

    let mut parts = vec![header(severity, pipeline, None)];
    parts.push(format!(
        "{}/{} steps succeeded",
        summary.outcomes.len() - failed,
        summary.outcomes.len()
    ));
    for outcome in summary.outcomes.iter().filter(|o| !o.is_success()) {
        parts.push(format!("{}: exit {}", outcome.step, outcome.exit_code));
    }
    parts.join(" | ")
}

pub fn test_message(pipeline: &str) -> String {
    format!("{} | Test notification", header(Severity::Info, pipeline, None))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
