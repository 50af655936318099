pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::calc::CalcInput;
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::AppConfig;
use crate::providers::ExchangeRateProvider;
use crate::store::KeyValueStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Rate { currency: String, refresh: bool },
    ClearCache { currency: Option<String> },
    Calculate(CalcInput),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("resval starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store = if config.cache.persist {
        KeyValueStore::new(Some(&config.default_data_path()?.join("cache")))
    } else {
        KeyValueStore::in_memory()
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let provider = ExchangeRateProvider::from_config(&config, &store, Arc::clone(&clock))?;
    let local_currency = provider.local_currency().to_string();

    match command {
        AppCommand::Rate { currency, refresh } => {
            cli::rate::run(&currency, refresh, &provider, &local_currency).await
        }
        AppCommand::ClearCache { currency } => {
            cli::rate::clear_cache(currency.as_deref(), &provider).await
        }
        AppCommand::Calculate(input) => {
            cli::calc::run(&input, &provider, &local_currency, clock.as_ref()).await
        }
    }
}
