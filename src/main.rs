//! Auto Advisor MCP Server - Rust Implementation
//!
//! A Model Context Protocol (MCP) server for querying vehicle sale records
//! and estimating sale prices.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use auto_advisor_mcp::cars::report::DataReport;
use auto_advisor_mcp::config::Config;
use auto_advisor_mcp::mcp::server::McpServer;
use auto_advisor_mcp::mcp::tools::ToolHandler;

/// Auto Advisor MCP Server
#[derive(Parser)]
#[command(name = "auto-advisor")]
#[command(author, version, about = "Auto Advisor - A Model Context Protocol server for vehicle sales data")]
struct Cli {
    /// Path to the vehicle sales CSV (overrides AUTO_ADVISOR_DATA_PATH)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Load the dataset and fit the price model before serving
    #[arg(long)]
    eager: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a diagnostic report for a sales table
    Check {
        /// Path to the car sales CSV file
        #[arg(long)]
        csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (stdout carries protocol frames)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Check { csv }) => {
            println!("[INFO] Loading dataset: {}", csv.display());
            let report = DataReport::from_path(&csv)
                .with_context(|| format!("reading {}", csv.display()))?;
            print!("{}", report);
        }
        None => {
            let mut config = Config::new();
            if let Some(data) = cli.data {
                config = config.with_data_path(data);
            }
            run_server(config, cli.eager).await?;
        }
    }

    Ok(())
}

async fn run_server(config: Config, eager: bool) -> anyhow::Result<()> {
    if !config.data_file_exists() {
        tracing::warn!(
            path = %config.data_path.display(),
            "Data file not found; tool calls will fail until it exists"
        );
    }

    let tool_handler = ToolHandler::new(config.data_path.clone());

    if eager {
        config.require_data_file()?;
        tool_handler
            .context()
            .await
            .context("initializing dataset and price model")?;
    }

    tracing::info!(data = %config.data_path.display(), "Serving MCP on stdio");

    // Create and run MCP server
    let mut server = McpServer::new(tool_handler);
    server.run_stdio().await?;

    Ok(())
}
