//! Log metric extraction.
//!
//! The collaborator scripts print their run counters as plain text lines
//! (`  - Total records: 1384`). Newer scripts can drop a small JSON result
//! file instead; the line scan stays as the fallback for the ones that
//! only log.

use crate::config::StepConfig;
use crate::models::LogMetrics;
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

/// Line prefixes the collaborator scripts print their counters with.
pub const TOTAL_RECORDS_PREFIX: &str = "Total records:";
pub const SUCCESSFUL_PREFIX: &str = "Successful:";

/// Value from the last `<prefix> <digits>` line in the file.
/// Missing file, unreadable file, or no matching line all yield `None`.
pub fn scan_for_metric(path: &Path, prefix: &str) -> Option<i64> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            debug!("Log {:?} not readable: {}", path, e);
            return None;
        }
    };

    let re = Regex::new(&format!(r"{}\s*(\d+)", regex::escape(prefix))).ok()?;

    let mut last = None;
    for line in text.lines() {
        if let Some(caps) = re.captures(line) {
            if let Ok(v) = caps[1].parse::<i64>() {
                last = Some(v);
            }
        }
    }
    last
}

/// Both counters from a single log file.
pub fn scan_log(path: &Path) -> LogMetrics {
    LogMetrics {
        total_records: scan_for_metric(path, TOTAL_RECORDS_PREFIX),
        successful: scan_for_metric(path, SUCCESSFUL_PREFIX),
    }
}

/// Structured result file written by newer collaborator scripts:
/// `{"total_records": N, "successful": N}`.
pub fn load_result_file(path: &Path) -> Option<LogMetrics> {
    let text = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&text) {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            warn!("Result file {:?} is not valid JSON: {}", path, e);
            None
        }
    }
}

/// Metrics for a finished step: result file first, log scan as fallback.
/// Relative paths resolve against the step's working directory.
pub fn collect_metrics(step: &StepConfig, workdir: &Path) -> LogMetrics {
    if let Some(result_file) = &step.result_file {
        let path = workdir.join(result_file);
        if let Some(metrics) = load_result_file(&path) {
            debug!("{}: metrics from result file {:?}", step.name, path);
            return metrics;
        }
    }

    match &step.log_file {
        Some(log_file) => scan_log(&workdir.join(log_file)),
        None => LogMetrics::default(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
