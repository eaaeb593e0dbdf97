//! rolemap server - main binary
//!
//! Serves role/permission crawls over HTTP and writes the results as day-partitioned
//! newline-delimited JSON tables.

use anyhow::{Context, Result};
use clap::Parser;
use rolemap_crawler::clients::{GoogleIamClient, HttpClientConfig, ResourceManagerClient};
use rolemap_crawler::{CrawlMetrics, NdjsonSink};
use rolemap_server::{AppState, ModeKind, Server, ServiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// rolemap server CLI
#[derive(Parser)]
#[command(name = "rolemap-server")]
#[command(about = "Crawls IAM roles and permissions into warehouse tables")]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, env = "ROLEMAP_CONFIG")]
    config: Option<PathBuf>,

    /// Crawl mode (overrides config)
    #[arg(long, value_enum, env = "ROLEMAP_MODE")]
    mode: Option<ModeKind>,

    /// Organization id (overrides config)
    #[arg(long, env = "ROLEMAP_ORGANIZATION")]
    organization: Option<String>,

    /// Region tag written on every row (overrides config)
    #[arg(long, env = "ROLEMAP_REGION")]
    region: Option<String>,

    /// Sink output directory (overrides config)
    #[arg(long, env = "ROLEMAP_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Listen port (overrides config)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Bearer token for the Google APIs
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    info!("Starting rolemap server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => {
            let config = ServiceConfig::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => ServiceConfig::default(),
    };

    // Apply CLI overrides
    if let Some(mode) = cli.mode {
        config.crawl.mode = mode;
    }
    if let Some(organization) = cli.organization {
        config.crawl.organization = Some(organization);
    }
    if let Some(region) = cli.region {
        config.crawl.region = region;
    }
    if let Some(output_dir) = cli.output_dir {
        config.sink.output_dir = output_dir;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.access_token.is_some() {
        config.google.access_token = cli.access_token;
    }

    // Validate configuration
    config.validate()?;

    let state = build_state(&config)?;
    info!(
        "Crawling in {} mode, region {}, writing to {:?}",
        state.mode, config.crawl.region, config.sink.output_dir
    );

    Server::new(config.listen_addr(), state).run().await?;

    info!("Server stopped gracefully");
    Ok(())
}

fn build_state(config: &ServiceConfig) -> Result<AppState> {
    let token = config.google.access_token.clone();

    let iam = Arc::new(
        GoogleIamClient::new(
            HttpClientConfig::new(&config.google.iam_url)
                .with_access_token(token.clone())
                .with_timeout(config.request_timeout()),
        )
        .context("Failed to create IAM client")?,
    );
    let hierarchy = Arc::new(
        ResourceManagerClient::new(
            HttpClientConfig::new(&config.google.resource_manager_url)
                .with_access_token(token)
                .with_timeout(config.request_timeout()),
        )
        .context("Failed to create resource manager client")?,
    );

    let sink = Arc::new(
        NdjsonSink::new(&config.sink.output_dir)
            .with_tables(&config.sink.roles_table, &config.sink.permissions_table),
    );
    let metrics = Arc::new(CrawlMetrics::new().context("Failed to register metrics")?);

    Ok(AppState::new(
        config.crawl_mode(),
        config.crawler_config(),
        iam.clone(),
        hierarchy,
        iam,
        sink,
        metrics,
    )
    .with_crawl_timeout(config.crawl_timeout()))
}
