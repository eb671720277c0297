use crate::config::schema::SessionConfig;
use crate::utils::{Result, SessionError};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_TIMEOUT: &str = "MEMSESSION_TIMEOUT";
pub const ENV_EXPIRATION: &str = "MEMSESSION_EXPIRATION";
pub const ENV_SWEEP_INTERVAL: &str = "MEMSESSION_SWEEP_INTERVAL";
pub const ENV_COOKIE_NAME: &str = "MEMSESSION_COOKIE_NAME";

/// Loads the session configuration.
///
/// Layers, lowest precedence first: built-in defaults, the JSON config file
/// (`cli_config_path` or `~/.memsession/config.json`), then `MEMSESSION_*`
/// environment variables.
pub fn load_config(cli_config_path: Option<PathBuf>) -> Result<SessionConfig> {
    tracing::debug!("Loading configuration");

    let mut config = SessionConfig::default();

    // Layer 1: config file
    let config_file = cli_config_path.clone().or_else(get_default_config_path);

    if let Some(ref path) = config_file {
        if path.exists() {
            tracing::debug!(config_path = %path.display(), "Loading configuration from file");
            config = read_config_file(path)?;
        } else if cli_config_path.is_some() {
            return Err(SessionError::config(format!(
                "config file {} does not exist",
                path.display()
            )));
        } else {
            tracing::debug!(config_path = %path.display(), "Config file not found, using defaults");
        }
    }

    // Layer 2: environment variables override
    tracing::debug!("Applying environment variable overrides");
    config = merge_env_with(config, |key| std::env::var(key).ok())?;

    validate(&config)?;

    tracing::debug!(
        timeout_secs = config.timeout_secs,
        expiration_secs = config.expiration_secs,
        sweep_interval_secs = config.sweep_interval_secs,
        cookie_name = %config.cookie.name,
        "Configuration loaded successfully"
    );

    Ok(config)
}

pub fn get_default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".memsession").join("config.json"))
}

fn read_config_file(path: &Path) -> Result<SessionConfig> {
    let content = fs::read_to_string(path).map_err(|e| SessionError::io(path, e))?;
    let config: SessionConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Applies `MEMSESSION_*` overrides read through `lookup`.
/// Empty values are ignored.
fn merge_env_with<F>(mut config: SessionConfig, lookup: F) -> Result<SessionConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(value) = get(ENV_TIMEOUT) {
        config.timeout_secs = parse_secs(ENV_TIMEOUT, &value)?;
    }
    if let Some(value) = get(ENV_EXPIRATION) {
        config.expiration_secs = parse_secs(ENV_EXPIRATION, &value)?;
    }
    if let Some(value) = get(ENV_SWEEP_INTERVAL) {
        config.sweep_interval_secs = parse_secs(ENV_SWEEP_INTERVAL, &value)?;
    }
    if let Some(value) = get(ENV_COOKIE_NAME) {
        config.cookie.name = value.trim().to_string();
    }

    Ok(config)
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        SessionError::config(format!(
            "{} must be a whole number of seconds, got {:?}",
            key, value
        ))
    })
}

pub fn validate(config: &SessionConfig) -> Result<()> {
    if config.sweep_interval_secs == 0 {
        return Err(SessionError::config("sweep_interval_secs must be greater than 0"));
    }

    config.cookie.validate()
}
