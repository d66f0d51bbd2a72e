//! nftmarket CLI
//!
//! # Usage
//!
//! ```bash
//! # Walk through a full sale against in-memory collaborators
//! nftmarket demo --price 0.1 --new-price 0.2
//!
//! # Same, as JSON
//! nftmarket demo --format json
//!
//! # Show the effective configuration
//! NFTMARKET__MARKET__MARKET_ACCOUNT=0xmarket nftmarket config
//! ```

mod config;
mod demo;
mod display;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nftmarket_core::{Amount, STANDARD_DECIMALS};

use crate::config::CliConfig;

/// nftmarket - list, buy and settle items against an asset registry
#[derive(Parser, Debug)]
#[command(name = "nftmarket")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, global = true, env = "NFTMARKET_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "NFTMARKET_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, global = true, env = "NFTMARKET_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mint, list, reprice, buy and withdraw using in-memory collaborators
    Demo {
        /// Listing price in whole units (18 decimals)
        #[arg(long, default_value = "0.1")]
        price: String,

        /// Price the listing is updated to before the sale
        #[arg(long, default_value = "0.2")]
        new_price: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cli_config = CliConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        cli_config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        cli_config.logging.format = format;
    }

    init_logging(&cli_config.logging)?;
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting nftmarket");

    match cli.command {
        Commands::Demo {
            price,
            new_price,
            format,
        } => {
            let price = Amount::parse_units(&price, STANDARD_DECIMALS)?;
            let new_price = Amount::parse_units(&new_price, STANDARD_DECIMALS)?;
            let walkthrough = demo::run_walkthrough(cli_config.market, price, new_price).await?;
            match format {
                OutputFormat::Pretty => demo::print_pretty(&walkthrough),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&walkthrough)?),
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&cli_config)?);
        }
    }

    Ok(())
}

/// Initialize tracing; logs go to stderr so stdout stays parseable
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true).with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}
