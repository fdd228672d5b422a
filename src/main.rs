mod config;
mod logscan;
mod models;
mod notify;
mod pipeline;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::notify::{DiscordNotifier, Notifier, message};
use crate::pipeline::Pipeline;

#[derive(Parser)]
#[command(
    name = "tv-pipeline",
    about = "TradingView data pipeline runner with Discord notifications",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Run one pipeline step, or every configured step in order
    Run {
        /// Step name from the config (default: all steps)
        step: Option<String>,
    },

    /// Send a test notification to the configured webhook
    Test,

    /// List configured pipeline steps
    Steps,

    /// Print the metrics extracted from a log file
    Scan {
        /// Path to the log file to scan
        log: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "tv_pipeline=info,warn",
        1 => "tv_pipeline=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Run { step } => {
            let notifier = Arc::new(DiscordNotifier::new(&config.notify));
            if notifier.is_enabled() {
                info!("Notifying {}", config.notify.redacted_url());
            }

            let code = {
                let _t = utils::Timer::start("Pipeline run");
                let summary = Pipeline::new(config, notifier).run(step.as_deref()).await?;
                info!(
                    "Done: {}/{} steps ok",
                    summary.outcomes.len() - summary.failed_count(),
                    summary.outcomes.len()
                );
                summary.exit_code()
            };

            // Mirror the pipeline's own exit status; the notification
            // side channel never feeds into it.
            if code != 0 {
                std::process::exit(code);
            }
        }

        Command::Test => {
            let notifier = DiscordNotifier::new(&config.notify);
            if !notifier.is_enabled() {
                println!("Notifications are disabled (no usable webhook URL).");
                std::process::exit(1);
            }

            match notifier.send(&message::test_message(&config.pipeline.name)).await {
                Ok(()) => println!("Test notification delivered to {}.", config.notify.redacted_url()),
                Err(e) => {
                    println!("Delivery failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Command::Steps => {
            if config.pipeline.steps.is_empty() {
                println!("No steps configured — add [[pipeline.steps]] entries to config/default.toml.");
            } else {
                println!("{} ({} steps):", config.pipeline.name, config.pipeline.steps.len());
                for s in &config.pipeline.steps {
                    let log = s
                        .log_file
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or("—".into());
                    println!("  {:<10} {} {}  [log: {}]", s.name, s.command, s.args.join(" "), log);
                }
            }
        }

        Command::Scan { log } => {
            let metrics = logscan::scan_log(&log);
            println!("{}", log.display());
            println!(
                "  Total records : {}",
                metrics.total_records.map(|v| v.to_string()).unwrap_or("—".into())
            );
            println!(
                "  Successful    : {}",
                metrics.successful.map(|v| v.to_string()).unwrap_or("—".into())
            );
        }
    }

    Ok(())
}
