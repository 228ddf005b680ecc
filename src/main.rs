use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use task_sync::config::AppConfig;
use task_sync::pipeline::TaskSyncPipeline;

/// Match chat messages against the task registry and post a summary report.
#[derive(Debug, Parser)]
#[command(name = "task-sync", version, about)]
struct Cli {
    /// JSON array of messages (`ts`, `user`, `text`); `-` reads stdin.
    #[arg(short, long, default_value = "-")]
    messages: String,

    /// Oracle backend: anything containing "openai" selects OpenAI, otherwise HuggingFace.
    #[arg(short, long, env = "TASK_SYNC_BACKEND", default_value = "openai")]
    backend: String,

    /// Registry CSV; overrides TASK_REGISTRY_PATH.
    #[arg(short, long)]
    registry: Option<PathBuf>,

    /// Print the report without posting it to Slack.
    #[arg(long)]
    no_deliver: bool,

    /// Print an example message batch and exit.
    #[arg(long)]
    example: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.example {
        println!("{}", example_batch()?);
        return Ok(());
    }

    let mut config = AppConfig::from_env()?;
    if let Some(path) = cli.registry {
        config.registry_path = path;
    }

    let messages_json = read_messages(&cli.messages)?;

    eprintln!("📋 task-sync v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Registry: {}", config.registry_path.display());
    eprintln!("   Backend: {}", cli.backend);
    eprintln!(
        "   Slack: {}\n",
        if cli.no_deliver {
            "disabled (--no-deliver)"
        } else if config.slack.is_configured() {
            "enabled"
        } else {
            "not configured"
        }
    );

    let mut pipeline = TaskSyncPipeline::from_config(&config)?;
    if cli.no_deliver {
        pipeline = pipeline.without_delivery();
    }

    let output = pipeline.run(&messages_json, &cli.backend).await;
    println!("{output}");

    Ok(())
}

fn read_messages(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read messages from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(source)
        .with_context(|| format!("Failed to read messages from {source}"))
}

fn example_batch() -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp().to_string();
    let batch = serde_json::json!([
        { "ts": now, "user": "U12345", "text": "I finished the UI design, please review" },
        { "ts": now, "user": "U67890", "text": "Nice weather today" },
    ]);
    Ok(serde_json::to_string_pretty(&batch)?)
}
