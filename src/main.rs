use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use cpidata::core::log::init_logging;

const DEFAULT_COUNTRIES: &str = "UK,DE,FR,IT,ES";

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display category weights
    Weights {
        /// Comma-separated country codes
        #[arg(long, default_value = DEFAULT_COUNTRIES)]
        countries: String,
    },
    /// Display monthly price index coverage
    Index {
        /// Comma-separated country codes
        #[arg(long, default_value = DEFAULT_COUNTRIES)]
        countries: String,
    },
    /// Display index, rate of change and weights together
    Complete {
        /// Comma-separated country codes
        #[arg(long, default_value = DEFAULT_COUNTRIES)]
        countries: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;

    let config_path = cli.config_path.as_deref();
    let result = match cli.command {
        Some(Commands::Setup) => cpidata::cli::setup::setup(),
        Some(Commands::Weights { countries }) => {
            let countries = cpidata::parse_countries(&countries);
            cpidata::run_command(cpidata::AppCommand::Weights, &countries, config_path).await
        }
        Some(Commands::Index { countries }) => {
            let countries = cpidata::parse_countries(&countries);
            cpidata::run_command(cpidata::AppCommand::Index, &countries, config_path).await
        }
        Some(Commands::Complete { countries }) => {
            let countries = cpidata::parse_countries(&countries);
            cpidata::run_command(cpidata::AppCommand::Complete, &countries, config_path).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
