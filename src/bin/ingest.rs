use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pr_sentinel::config::AppConfig;
use pr_sentinel::docs::ingest::{run_ingest, IngestSource};

#[derive(Parser)]
#[command(
    name = "pr-sentinel-ingest",
    about = "Load Confluence pages into the semantic search collection"
)]
#[command(group(ArgGroup::new("source").required(true).args(["space_key", "page_ids", "from_stubs"])))]
struct Cli {
    /// Ingest every page of a Confluence space
    #[arg(long)]
    space_key: Option<String>,

    /// Ingest specific Confluence page ids
    #[arg(long, num_args = 1..)]
    page_ids: Vec<String>,

    /// Ingest every page of the stub dataset
    #[arg(long)]
    from_stubs: bool,

    /// Re-embed pages that are already in the collection
    #[arg(long)]
    force: bool,

    /// Debug logging and full error details
    #[arg(short, long)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,
}

impl Cli {
    fn source(&self) -> IngestSource {
        if self.from_stubs {
            IngestSource::Stubs
        } else if let Some(key) = &self.space_key {
            IngestSource::Space(key.clone())
        } else {
            IngestSource::Pages(self.page_ids.clone())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match ingest(&cli).await {
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

async fn ingest(cli: &Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    if config.semantic.host.is_none() {
        anyhow::bail!("CHROMADB_HOST must be set to ingest pages");
    }

    let stats = run_ingest(&config.confluence, &config.semantic, &cli.source(), cli.force).await?;
    println!("Ingested: {}", stats.ingested);
    println!("Skipped (already present): {}", stats.skipped);
    println!("Failed: {}", stats.failed);

    if stats.failed > 0 && stats.ingested == 0 && stats.skipped == 0 {
        anyhow::bail!("No pages could be ingested");
    }
    Ok(())
}
