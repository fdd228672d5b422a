use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_name")]
    pub name: String,

    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    #[serde(default = "default_true")]
    pub stop_on_failure: bool,

    #[serde(default = "default_steps")]
    pub steps: Vec<StepConfig>,
}

/// One external pipeline step
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StepConfig {
    pub name: String,

    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Overrides the pipeline-level working directory for this step.
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// The step's stdout+stderr are appended here, and the metric scan
    /// reads it back after the run. Relative to the working directory.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Structured result file the step may write. Takes precedence over
    /// the log scan when present.
    #[serde(default)]
    pub result_file: Option<PathBuf>,
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyConfig {
    /// Webhook URL is a secret: env/config only, never logged verbatim.
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl NotifyConfig {
    /// Webhook target safe for logs: scheme and host only, the path
    /// (which carries the token) is dropped.
    pub fn redacted_url(&self) -> String {
        match self.webhook_url.as_deref().and_then(|u| Url::parse(u).ok()) {
            Some(u) => format!("{}://{}", u.scheme(), u.host_str().unwrap_or("?")),
            None => "(unset)".to_string(),
        }
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_pipeline_name() -> String {
    "TradingView Data Pipeline".to_string()
}
fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_steps() -> Vec<StepConfig> {
    vec![
        StepConfig {
            name: "download".to_string(),
            command: "python3".to_string(),
            args: vec!["tradingview_downloader.py".to_string()],
            workdir: None,
            log_file: Some(PathBuf::from("tradingview_downloader.log")),
            result_file: None,
        },
        StepConfig {
            name: "upload".to_string(),
            command: "python3".to_string(),
            args: vec!["uploadtodb.py".to_string()],
            workdir: None,
            log_file: Some(PathBuf::from("uploadtodb.log")),
            result_file: None,
        },
        StepConfig {
            name: "score".to_string(),
            command: "python3".to_string(),
            args: vec!["calcompositescore.py".to_string()],
            workdir: None,
            log_file: Some(PathBuf::from("calcompositescore.log")),
            result_file: None,
        },
    ]
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("TVPIPE").separator("__"))
            .build()?;

        let mut app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());

        // Bare DISCORD_WEBHOOK_URL fills the gap, but never overrides an
        // explicitly configured URL.
        if app_cfg.notify.webhook_url.is_none() {
            app_cfg.notify.webhook_url = std::env::var("DISCORD_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.is_empty());
        }

        Ok(app_cfg)
    }

    pub fn step(&self, name: &str) -> Option<&StepConfig> {
        self.pipeline.steps.iter().find(|s| s.name == name)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            workdir: default_workdir(),
            stop_on_failure: true,
            steps: default_steps(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
            enabled: true,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
