use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use newswire::assemble::{FeedAssembler, FeedTarget};
use newswire::client::build_http_client;
use newswire::config::Config;
use newswire::refresh::{run_refresh, REFRESH_TIMEOUT};
use newswire::server;

#[derive(Parser, Debug)]
#[command(
    name = "newswire",
    version,
    about = "Category RSS aggregator with rewritten stories"
)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", default_value = "newswire.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve feeds over HTTP (default)
    Serve,
    /// Build one document and print it to stdout
    Generate {
        /// Category name, or `all` for the aggregate
        category: String,
        /// Indent the output
        #[arg(long)]
        pretty: bool,
    },
    /// Ask a running server to regenerate every category
    Refresh {
        /// Server base URL (overrides config and BASE_URL)
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?
        .with_env_overrides();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let assembler =
                FeedAssembler::from_config(&config).context("Failed to build HTTP client")?;
            server::serve(&config, Arc::new(assembler)).await?;
        }
        Command::Generate { category, pretty } => {
            let assembler =
                FeedAssembler::from_config(&config).context("Failed to build HTTP client")?;
            let xml = assembler
                .generate(&FeedTarget::from_name(&category), pretty)
                .await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(xml.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
        Command::Refresh { base_url } => {
            let base_url = base_url.unwrap_or_else(|| config.base_url.clone());
            let client = build_http_client(&config.fetch).context("Failed to build HTTP client")?;
            run_refresh(&client, &base_url, REFRESH_TIMEOUT).await;
        }
    }

    Ok(())
}
