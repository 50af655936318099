use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

pub const DEFAULT_PRIMARY_URL: &str = "https://api.exchangerate-api.com/v4/latest";
pub const DEFAULT_SECONDARY_URL: &str = "https://api.exchangerate.host/latest";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RemoteSourceConfig {
    pub base_url: String,
}

fn default_primary() -> Option<RemoteSourceConfig> {
    Some(RemoteSourceConfig {
        base_url: DEFAULT_PRIMARY_URL.to_string(),
    })
}

fn default_secondary() -> Option<RemoteSourceConfig> {
    Some(RemoteSourceConfig {
        base_url: DEFAULT_SECONDARY_URL.to_string(),
    })
}

fn default_timeout_secs() -> u64 {
    10
}

/// Remote rate sources in lookup order. Setting a source to `null` drops it
/// from the chain.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_primary")]
    pub primary: Option<RemoteSourceConfig>,
    #[serde(default = "default_secondary")]
    pub secondary: Option<RemoteSourceConfig>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            primary: default_primary(),
            secondary: default_secondary(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Keep fetched rates on disk between runs.
    #[serde(default)]
    pub persist: bool,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: default_ttl_secs(),
            persist: false,
        }
    }
}

fn default_local_currency() -> String {
    "CNY".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_local_currency")]
    pub local_currency: String,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Overrides for the built-in fallback rates, in local currency units.
    #[serde(default)]
    pub default_rates: HashMap<String, Decimal>,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            local_currency: default_local_currency(),
            providers: ProvidersConfig::default(),
            cache: CacheConfig::default(),
            default_rates: HashMap::new(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, falling back to built-in
    /// defaults when no file exists there.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("io", "resval", "resval")
            .context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
