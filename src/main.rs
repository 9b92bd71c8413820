use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pr_sentinel::app::build_workflow;
use pr_sentinel::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "pr-sentinel",
    about = "AI-assisted GitHub pull request reviewer with Jira and Confluence context"
)]
struct Cli {
    /// GitHub pull request URL, e.g. https://github.com/owner/repo/pull/123
    #[arg(long)]
    pr_url: String,

    /// Debug logging and full error details
    #[arg(short, long)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match review(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.verbose {
                eprintln!("Error: {e:?}");
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn review(cli: &Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    tracing::debug!(?config, "Loaded configuration");

    let workflow = build_workflow(&config)?;
    let state = workflow.run(&cli.pr_url).await?;

    tracing::info!(
        pr_url = %state.pr_url,
        decision = state.review_decision.as_ref().map(|d| d.as_str()).unwrap_or("none"),
        comments = state.review_comments.as_ref().map_or(0, Vec::len),
        "Review posted"
    );
    Ok(())
}
