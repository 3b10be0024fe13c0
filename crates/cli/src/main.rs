//! Agent Coverage Scanner CLI
//!
//! Discovers cloud compute workloads that are visible in resource
//! inventory but not running the monitoring agent, and the inverse,
//! across providers and sub-accounts.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{accounts, scan};
use config::CredentialArgs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Agent Coverage Scanner CLI
#[derive(Parser)]
#[command(name = "agentcov")]
#[command(author, version, about = "Discover hosts not running the monitoring agent", long_about = None)]
pub struct Cli {
    /// Tenant account to use (bare name or full domain)
    #[arg(long, env = "LW_ACCOUNT", global = true)]
    pub account: Option<String>,

    /// Sub-account to scope single-account runs to
    #[arg(long = "sub-account", env = "LW_SUBACCOUNT", global = true)]
    pub sub_account: Option<String>,

    /// API key to authenticate with
    #[arg(long, env = "LW_API_KEY", global = true)]
    pub api_key: Option<String>,

    /// API secret to authenticate with
    #[arg(long, env = "LW_API_SECRET", hide_env_values = true, global = true)]
    pub api_secret: Option<String>,

    /// Named credential profile from the local config file
    #[arg(short, long, env = "LW_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the coverage assessment
    Scan {
        /// Report results for only the configured sub-account instead of
        /// iterating every sub-account the caller can read
        #[arg(long)]
        current_sub_account_only: bool,

        /// Output only coverage statistics
        #[arg(long)]
        statistics: bool,

        /// Lookback window in days
        #[arg(long, default_value_t = coverage_lib::DEFAULT_LOOKBACK_DAYS)]
        lookback_days: i64,
    },

    /// List the sub-accounts the caller may inspect
    Accounts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let credentials = CredentialArgs {
        account: cli.account,
        sub_account: cli.sub_account,
        api_key: cli.api_key,
        api_secret: cli.api_secret,
        profile: cli.profile,
    }
    .resolve()?;

    match cli.command {
        Commands::Scan {
            current_sub_account_only,
            statistics,
            lookback_days,
        } => {
            scan::run(
                credentials,
                scan::ScanArgs {
                    current_sub_account_only,
                    format: cli.format,
                    statistics,
                    lookback_days,
                },
            )
            .await?;
        }
        Commands::Accounts => {
            accounts::run(credentials, cli.format).await?;
        }
    }

    Ok(())
}
