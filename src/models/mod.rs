use serde::{Deserialize, Serialize};

// ── Run metrics ───────────────────────────────────────────────────────────────

/// Counters a pipeline step reports about its own run, either via a
/// structured result file or scraped from its log. A step that reported
/// nothing leaves them absent, never zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMetrics {
    #[serde(default)]
    pub total_records: Option<i64>,

    #[serde(default)]
    pub successful: Option<i64>,
}

// ── Step outcome ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: String,
    pub exit_code: i32,
    pub metrics: LogMetrics,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

// ── Run summary ───────────────────────────────────────────────────────────────

/// Outcomes of every step that ran, in order.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<StepOutcome>,
}

impl RunSummary {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    /// The wrapper's own exit status: first failing step's code, 0 when
    /// everything passed.
    pub fn exit_code(&self) -> i32 {
        self.outcomes
            .iter()
            .find(|o| !o.is_success())
            .map(|o| o.exit_code)
            .unwrap_or(0)
    }
}

// ── Severity ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Failure,
    Warning,
    Info,
}

impl Severity {
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Success => "✅",
            Severity::Failure => "❌",
            Severity::Warning => "⚠️",
            Severity::Info => "ℹ️",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(step: &str, exit_code: i32) -> StepOutcome {
        StepOutcome {
            step: step.to_string(),
            exit_code,
            metrics: LogMetrics::default(),
        }
    }

    #[test]
    fn test_exit_code_first_failure_wins() {
        let summary = RunSummary {
            outcomes: vec![outcome("a", 0), outcome("b", 2), outcome("c", 7)],
        };
        assert_eq!(summary.exit_code(), 2);
        assert_eq!(summary.failed_count(), 2);
    }

    #[test]
    fn test_exit_code_all_success() {
        let summary = RunSummary {
            outcomes: vec![outcome("a", 0), outcome("b", 0)],
        };
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(summary.failed_count(), 0);
    }
}
