//! ynabber CLI - bank transactions into YNAB

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod settings;

use commands::{run, serve};
use settings::Overrides;

/// ynabber - read bank transactions and write them to YNAB
#[derive(Parser)]
#[command(name = "ynabber", version, about, long_about = None)]
struct Cli {
    /// Optional JSON settings file; environment and flags take precedence
    #[arg(long, env = "YNABBER_CONFIG", default_value = "ynabber.json")]
    config: PathBuf,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the run trigger (default)
    Serve,

    /// Run the pipeline once without the HTTP trigger
    Run {
        /// Bank id (defaults to NORDIGEN_BANKID)
        #[arg(long)]
        bank_id: Option<String>,
        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(
            cli.overrides.debug(),
            std::env::var("RUST_LOG").ok().as_deref(),
        ))
        .with_target(false)
        .init();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

/// RUST_LOG wins when it parses; otherwise the debug flag picks the level
fn env_filter(debug: bool, rust_log: Option<&str>) -> EnvFilter {
    if let Some(filter) = rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
    {
        return filter;
    }
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    EnvFilter::new(level.as_str())
}

async fn dispatch(cli: Cli) -> Result<()> {
    let ctx = commands::get_context(&cli.config, cli.overrides)?;
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run(ctx).await,
        Commands::Run { bank_id, json } => run::run(ctx, bank_id.as_deref(), json).await,
    }
}
