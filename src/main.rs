use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use mcp_registry_rs::github::{DEFAULT_API_URL, ReadmeFetcher, RepoLocation};
use mcp_registry_rs::query::QueryEngine;
use mcp_registry_rs::server::Registry;
use mcp_registry_rs::storage::SnapshotCache;

#[cfg(feature = "trace")]
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "MCP server for discovering MCP servers")]
struct Cli {
    /// Owner of the repository whose README lists the servers
    #[clap(long, env = "MCP_REGISTRY_OWNER", default_value = "modelcontextprotocol")]
    github_owner: String,
    /// Repository whose README lists the servers
    #[clap(long, env = "MCP_REGISTRY_REPO", default_value = "servers")]
    github_repo: String,
    /// Branch used when building links into the repository
    #[clap(long, env = "MCP_REGISTRY_BRANCH", default_value = "main")]
    github_branch: String,
    /// A github personal access token to use for authentication (optional)
    #[clap(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_pat: Option<String>,
    /// Base URL of the GitHub REST API
    #[clap(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
    /// Seconds a fetched server list stays fresh
    #[clap(long, default_value_t = 300)]
    cache_ttl_secs: u64,
    /// Seconds before a README fetch is abandoned
    #[clap(long, default_value_t = 30)]
    fetch_timeout_secs: u64,
    /// Write logs to this file instead of stderr
    #[clap(long)]
    log_file: Option<PathBuf>,
}

#[cfg(feature = "trace")]
fn init_tracing(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the JSON-RPC stream, so logs never go there
    match log_file {
        Some(path) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::fs::File::create(path)?)
            .with_ansi(false)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init(),
    }
    Ok(())
}

/// You can inspect the server using the Model Context Protocol Inspector.
/// npx @modelcontextprotocol/inspector cargo run -p mcp-registry-rs

#[tokio::main]
async fn main() -> Result<()> {
    // Get command line arguments
    let args = Cli::parse();

    #[cfg(feature = "trace")]
    init_tracing(args.log_file.as_ref())?;

    tracing::info!("Starting MCP registry server");

    let location = RepoLocation::new(&args.github_owner, &args.github_repo, &args.github_branch);
    let fetcher = ReadmeFetcher::new(
        location,
        &args.api_url,
        args.github_pat.as_deref(),
        Duration::from_secs(args.fetch_timeout_secs),
    )?;
    tracing::info!(
        "Reading servers from {}/{} via {}",
        args.github_owner, args.github_repo, args.api_url
    );

    // Nothing is fetched until the first tool call
    let cache = SnapshotCache::new(Arc::new(fetcher))
        .with_ttl(Duration::from_secs(args.cache_ttl_secs));
    let engine = QueryEngine::new(Arc::new(cache));

    let service = Registry::new(engine)
        .serve(stdio()).await.inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })?;

    service.waiting().await?;
    Ok(())
}
