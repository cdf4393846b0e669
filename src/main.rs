use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use resilient_call::config::AppConfig;
use resilient_call::error::SubmitError;
use resilient_call::logging;
use resilient_call::queue::FailureQueue;
use resilient_call::submit::ResilientSubmitter;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "resilient-call", version, about = "Submit JSON with retries and a durable failure queue")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "resilient-call.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// POST a JSON payload, retrying transient failures and queueing permanent ones
    Submit {
        /// Category recorded with the payload if it ends up in the queue
        #[arg(long)]
        form_type: String,
        #[arg(long)]
        url: String,
        /// Inline JSON payload
        #[arg(long, conflicts_with = "data_file")]
        data: Option<String>,
        /// File containing the JSON payload
        #[arg(long)]
        data_file: Option<PathBuf>,
    },
    /// Inspect or recover queued submissions
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// One line per queued submission
    List,
    /// Pretty-printed JSON to stdout or a file
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove every queued submission
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config first (before logging init) to get logging config
    let config = AppConfig::load_or_default(&cli.config);
    config
        .validate()
        .context("Configuration validation failed")?;

    let _guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging system")?;

    match cli.command {
        Command::Submit {
            form_type,
            url,
            data,
            data_file,
        } => submit(&config, &form_type, &url, data, data_file).await,
        Command::Queue { action } => {
            run_queue_action(FailureQueue::from_config(&config.queue), action)
        }
    }
}

async fn submit(
    config: &AppConfig,
    form_type: &str,
    url: &str,
    data: Option<String>,
    data_file: Option<PathBuf>,
) -> Result<()> {
    let raw = match (data, data_file) {
        (Some(data), _) => data,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read payload file: {:?}", path))?,
        (None, None) => bail!("Either --data or --data-file is required"),
    };
    let payload: serde_json::Value =
        serde_json::from_str(&raw).context("Payload is not valid JSON")?;

    let submitter = ResilientSubmitter::from_config(config)?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling submission");
            signal_token.cancel();
        }
    });

    let result = submitter.submit(form_type, url, &payload, &cancel).await;
    info!(metrics = ?submitter.metrics().snapshot(), "Submission finished");

    let response = match result {
        Ok(response) => response,
        Err(e @ SubmitError::Failed(_)) => {
            return Err(e).context("Submission failed; payload kept in the failure queue");
        }
        Err(e) => return Err(e.into()),
    };
    println!("{}", response.status);
    let body = response.text();
    if !body.is_empty() {
        println!("{}", body);
    }
    Ok(())
}

fn run_queue_action(queue: FailureQueue, action: QueueAction) -> Result<()> {
    match action {
        QueueAction::List => {
            for entry in queue.list() {
                let status = entry
                    .error
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    entry.id, entry.timestamp, entry.form_type, status, entry.error.message
                );
            }
        }
        QueueAction::Export { output: Some(path) } => {
            let count = queue
                .export_to(&path)
                .with_context(|| format!("Failed to export queue to {:?}", path))?;
            info!("Exported {} submissions to {:?}", count, path);
        }
        QueueAction::Export { output: None } => println!("{}", queue.export()),
        QueueAction::Clear => queue.clear(),
    }
    Ok(())
}
