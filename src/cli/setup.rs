use crate::core::config::AppConfig;
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");

/// Writes the example configuration to `config_path`, or to the platform
/// config directory when no path is given. Never overwrites a file.
pub fn setup(config_path: Option<&str>) -> Result<()> {
    let target = match config_path {
        Some(path) => PathBuf::from(path),
        None => AppConfig::default_config_path()?,
    };
    write_example_config(&target)?;

    println!("Wrote example configuration to {}", target.display());
    println!("Edit local_currency and default_rates to match your setup.");
    Ok(())
}

pub fn write_example_config(target: &Path) -> Result<()> {
    if target.exists() {
        bail!(
            "Refusing to overwrite existing configuration at {}",
            target.display()
        );
    }

    let dir = target.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
    }

    fs::write(target, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write example configuration to {}", target.display()))?;
    tracing::info!(path = %target.display(), "Example configuration written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_example_into_missing_directories() -> Result<()> {
        let dir = TempDir::new()?;
        let target = dir.path().join("resval").join("config.yaml");

        write_example_config(&target)?;

        let written = fs::read_to_string(&target)?;
        assert_eq!(written, EXAMPLE_CONFIG);
        let loaded = AppConfig::load_from_path(&target)?;
        assert_eq!(loaded.local_currency, "CNY");
        Ok(())
    }

    #[test]
    fn test_existing_file_is_left_alone() -> Result<()> {
        let dir = TempDir::new()?;
        let target = dir.path().join("config.yaml");
        fs::write(&target, "local_currency: HKD\n")?;

        let err = write_example_config(&target).unwrap_err();
        assert!(err.to_string().contains("Refusing to overwrite"));
        assert_eq!(fs::read_to_string(&target)?, "local_currency: HKD\n");
        Ok(())
    }

    #[test]
    fn test_setup_honours_explicit_path() -> Result<()> {
        let dir = TempDir::new()?;
        let target = dir.path().join("custom.yaml");

        setup(target.to_str())?;
        assert!(target.exists());
        Ok(())
    }

    #[test]
    fn test_example_config_matches_builtin_defaults() -> Result<()> {
        let example: AppConfig = serde_yaml::from_str(EXAMPLE_CONFIG)
            .context("Example configuration is not valid YAML")?;
        let builtin = AppConfig::default();

        assert_eq!(example.local_currency, builtin.local_currency);
        assert_eq!(example.providers.timeout_secs, builtin.providers.timeout_secs);
        assert_eq!(
            example.providers.primary.map(|p| p.base_url),
            builtin.providers.primary.map(|p| p.base_url)
        );
        assert_eq!(
            example.providers.secondary.map(|p| p.base_url),
            builtin.providers.secondary.map(|p| p.base_url)
        );
        assert_eq!(example.cache.ttl_secs, builtin.cache.ttl_secs);
        assert_eq!(example.cache.persist, builtin.cache.persist);
        assert_eq!(example.default_rates.len(), 5);
        Ok(())
    }
}
