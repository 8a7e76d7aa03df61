pub mod cli;
pub mod core;
pub mod manager;
pub mod providers;

use crate::core::config::AppConfig;
use crate::manager::UnifiedDataManager;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Weights,
    Index,
    Complete,
}

/// Normalises a comma-separated country list: trimmed, upper-cased, no blanks.
pub fn parse_countries(list: &str) -> Vec<String> {
    list.split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect()
}

pub async fn run_command(
    command: AppCommand,
    countries: &[String],
    config_path: Option<&str>,
) -> Result<()> {
    info!("cpidata starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let mut manager = UnifiedDataManager::new(&config)?;
    let spinner = cli::ui::new_spinner(&format!("Fetching data for {}", countries.join(", ")));

    match command {
        AppCommand::Weights => {
            let weights = manager.get_weights(countries).await;
            spinner.finish_and_clear();
            cli::report::print_weights(&weights?);
        }
        AppCommand::Index => {
            let index = manager.get_index(countries).await;
            spinner.finish_and_clear();
            cli::report::print_index(&index);
        }
        AppCommand::Complete => {
            let data = manager.get_complete(countries, &config.periods).await;
            spinner.finish_and_clear();
            cli::report::print_complete(&data?);
        }
    }
    Ok(())
}
