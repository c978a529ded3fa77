//! Configuration file loader for `cockpit.toml`.

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use std::path::Path;

/// Loads the configuration at `path`.
///
/// # Returns
///
/// The parsed `AppConfig`. If the file does not exist, returns the
/// default configuration rather than an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - The file exists but cannot be read
/// - The file is not valid TOML or has fields of the wrong type
/// - Values are out of range (empty shell, zero capacity or page size)
///
/// # Example
///
/// ```rust,no_run
/// use ck_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("cockpit.toml")).await?;
/// println!("Listening on {}", config.server.bind);
/// # Ok(())
/// # }
/// ```
pub async fn load_config(path: &Path) -> ConfigResult<AppConfig> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(AppConfig::default());
    }

    let content =
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;

    parse_config(path, &content)
}

/// Parses and validates configuration text read from `path`.
pub fn parse_config(path: &Path, content: &str) -> ConfigResult<AppConfig> {
    let config: AppConfig = toml::from_str(content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;

    validate(path, &config)?;
    Ok(config)
}

fn validate(path: &Path, config: &AppConfig) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigError::InvalidConfig {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if matches!(&config.runner.shell, Some(shell) if shell.is_empty()) {
        return Err(invalid("runner.shell must name a program"));
    }
    if config.runner.subscriber_capacity == 0 {
        return Err(invalid("runner.subscriber_capacity must be at least 1"));
    }
    if config.server.max_page_size == 0 {
        return Err(invalid("server.max_page_size must be at least 1"));
    }
    Ok(())
}
