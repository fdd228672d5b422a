//! Run orchestration: external step → exit code → metrics → notification.
//!
//! The pipeline steps are opaque collaborators. This layer only runs them,
//! observes the exit status, pulls counters out of their logs, and narrates
//! the outcome to the webhook. Notification is strictly observational: a
//! delivery failure never changes the run's own exit code.

use crate::config::{AppConfig, StepConfig};
use crate::logscan;
use crate::models::{RunSummary, StepOutcome};
use crate::notify::{Notifier, message};
use anyhow::{Context, Result, bail};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{error, info, warn};

pub struct Pipeline {
    config: AppConfig,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    pub fn new(config: AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self { config, notifier }
    }

    /// Run one named step, or every configured step in order.
    pub async fn run(&self, step: Option<&str>) -> Result<RunSummary> {
        let steps: Vec<StepConfig> = match step {
            Some(name) => vec![
                self.config
                    .step(name)
                    .with_context(|| format!("No step named '{}' in config", name))?
                    .clone(),
            ],
            None => self.config.pipeline.steps.clone(),
        };

        if steps.is_empty() {
            bail!("No pipeline steps configured");
        }

        let mut summary = RunSummary::default();

        for (i, step_cfg) in steps.iter().enumerate() {
            info!("=== Step {}/{}: {} ===", i + 1, steps.len(), step_cfg.name);
            let outcome = self.run_step(step_cfg).await?;
            let failed = !outcome.is_success();
            summary.outcomes.push(outcome);

            if failed && self.config.pipeline.stop_on_failure {
                warn!("{}: failed, stopping run", step_cfg.name);
                break;
            }
        }

        // Per-step messages already went out; a roll-up is only worth
        // sending when a multi-step run kept going past failures.
        if step.is_none() && !self.config.pipeline.stop_on_failure && summary.outcomes.len() > 1 {
            self.deliver(&message::run_summary(&self.config.pipeline.name, &summary))
                .await;
        }

        info!(
            "Run finished: {}/{} steps ok, exit code {}",
            summary.outcomes.len() - summary.failed_count(),
            summary.outcomes.len(),
            summary.exit_code()
        );
        Ok(summary)
    }

    /// Run a single step and narrate its outcome.
    pub async fn run_step(&self, step: &StepConfig) -> Result<StepOutcome> {
        let workdir = self.step_workdir(step);
        let exit_code = self.spawn(step, &workdir).await?;
        let metrics = logscan::collect_metrics(step, &workdir);

        let outcome = StepOutcome {
            step: step.name.clone(),
            exit_code,
            metrics,
        };

        let text = if outcome.is_success() {
            message::step_success(&self.config.pipeline.name, &outcome)
        } else {
            message::step_failure(&self.config.pipeline.name, &outcome, step.log_file.as_deref())
        };
        self.deliver(&text).await;

        Ok(outcome)
    }

    /// Launch the external command and wait for it. Stdout+stderr append to
    /// the step's log file when one is configured. A command that cannot be
    /// launched at all reports 127, shell-style; signal death reports 1.
    async fn spawn(&self, step: &StepConfig, workdir: &Path) -> Result<i32> {
        let mut cmd = Command::new(&step.command);
        cmd.args(&step.args).current_dir(workdir);

        if let Some(log_file) = &step.log_file {
            let path = workdir.join(log_file);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Could not open log file {:?}", path))?;
            let stderr = file
                .try_clone()
                .with_context(|| format!("Could not clone log handle for {:?}", path))?;
            cmd.stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
        }

        info!("{}: {} {}", step.name, step.command, step.args.join(" "));

        let code = match cmd.status().await {
            Ok(status) => match status.code() {
                Some(code) => code,
                None => {
                    warn!("{}: terminated by signal, reporting exit code 1", step.name);
                    1
                }
            },
            Err(e) => {
                error!("{}: failed to launch '{}': {}", step.name, step.command, e);
                127
            }
        };

        if code == 0 {
            info!("{}: exit 0", step.name);
        } else {
            warn!("{}: exit {}", step.name, code);
        }
        Ok(code)
    }

    /// Best-effort delivery: failures are logged and dropped.
    async fn deliver(&self, text: &str) {
        if let Err(e) = self.notifier.send(text).await {
            error!("Notification delivery failed: {}", e);
        }
    }

    fn step_workdir(&self, step: &StepConfig) -> PathBuf {
        step.workdir
            .clone()
            .unwrap_or_else(|| self.config.pipeline.workdir.clone())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every message instead of sending it.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, message: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    /// Fails every delivery, like a dead webhook.
    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _message: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "boom".to_string(),
            })
        }
    }

    fn shell_step(name: &str, script: &str, workdir: &Path, log_file: Option<&str>) -> StepConfig {
        StepConfig {
            name: name.to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            workdir: Some(workdir.to_path_buf()),
            log_file: log_file.map(PathBuf::from),
            result_file: None,
        }
    }

    fn pipeline_with(steps: Vec<StepConfig>, notifier: Arc<dyn Notifier>) -> Pipeline {
        let mut config = AppConfig::default();
        config.pipeline.name = "TradingView Data Pipeline".to_string();
        config.pipeline.steps = steps;
        Pipeline::new(config, notifier)
    }

    #[tokio::test]
    async fn test_success_run_scrapes_log_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let step = shell_step(
            "upload",
            "echo 'Total records: 1384'; echo 'Successful: 1383'",
            dir.path(),
            Some("upload.log"),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = pipeline_with(vec![step], notifier.clone());

        let summary = pipeline.run(None).await.unwrap();
        assert_eq!(summary.exit_code(), 0);

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("✅"));
        assert!(sent[0].contains("1384"));
        assert!(sent[0].contains("1383"));
        assert!(sent[0].contains(message::COMPLETION_MARKER));
    }

    #[tokio::test]
    async fn test_failure_run_reports_exact_code() {
        let dir = tempfile::tempdir().unwrap();
        let step = shell_step("upload", "exit 1", dir.path(), Some("upload.log"));
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = pipeline_with(vec![step], notifier.clone());

        let summary = pipeline.run(None).await.unwrap();
        assert_eq!(summary.exit_code(), 1);

        let sent = notifier.sent.lock().unwrap();
        assert!(sent[0].contains("❌"));
        assert!(sent[0].contains("Exit code: 1"));
        assert!(sent[0].contains("upload.log"));
    }

    #[tokio::test]
    async fn test_empty_log_still_composes_success() {
        let dir = tempfile::tempdir().unwrap();
        let step = shell_step("quiet", "true", dir.path(), Some("quiet.log"));
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = pipeline_with(vec![step], notifier.clone());

        let summary = pipeline.run(None).await.unwrap();
        assert_eq!(summary.exit_code(), 0);

        let sent = notifier.sent.lock().unwrap();
        assert!(sent[0].contains("✅"));
        assert!(!sent[0].contains("Total records"));
    }

    #[tokio::test]
    async fn test_delivery_failure_never_changes_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let step = shell_step("upload", "true", dir.path(), None);
        let pipeline = pipeline_with(vec![step], Arc::new(FailingNotifier));

        let summary = pipeline.run(None).await.unwrap();
        assert_eq!(summary.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_stop_on_failure_skips_later_steps() {
        let dir = tempfile::tempdir().unwrap();
        let steps = vec![
            shell_step("first", "exit 3", dir.path(), None),
            shell_step("second", "true", dir.path(), None),
        ];
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = pipeline_with(steps, notifier.clone());

        let summary = pipeline.run(None).await.unwrap();
        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_continue_past_failure_sends_summary() {
        let dir = tempfile::tempdir().unwrap();
        let steps = vec![
            shell_step("first", "exit 2", dir.path(), None),
            shell_step("second", "true", dir.path(), None),
        ];
        let notifier = Arc::new(RecordingNotifier::default());
        let mut config = AppConfig::default();
        config.pipeline.stop_on_failure = false;
        config.pipeline.steps = steps;
        let pipeline = Pipeline::new(config, notifier.clone());

        let summary = pipeline.run(None).await.unwrap();
        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(summary.exit_code(), 2);

        let sent = notifier.sent.lock().unwrap();
        // two per-step messages plus the roll-up
        assert_eq!(sent.len(), 3);
        assert!(sent[2].contains("⚠️"));
        assert!(sent[2].contains("first: exit 2"));
    }

    #[tokio::test]
    async fn test_unlaunchable_command_reports_127() {
        let dir = tempfile::tempdir().unwrap();
        let step = StepConfig {
            name: "ghost".to_string(),
            command: "definitely-not-a-real-binary-xyz".to_string(),
            args: vec![],
            workdir: Some(dir.path().to_path_buf()),
            log_file: None,
            result_file: None,
        };
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = pipeline_with(vec![step], notifier.clone());

        let summary = pipeline.run(None).await.unwrap();
        assert_eq!(summary.exit_code(), 127);

        let sent = notifier.sent.lock().unwrap();
        assert!(sent[0].contains("Exit code: 127"));
    }

    #[tokio::test]
    async fn test_unknown_step_name_is_an_error() {
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = pipeline_with(vec![], notifier);
        assert!(pipeline.run(Some("nope")).await.is_err());
    }
}
