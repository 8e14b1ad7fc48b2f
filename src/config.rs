use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Directory the acquisition step downloads NEM12 files into.
    pub drop_dir: Option<PathBuf>,
    /// Days in the centred rolling mean reported alongside daily usage.
    pub rolling_window_days: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let drop_dir = env_map
            .get("NEM12_DROP_DIR")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let rolling_window_days = env_map
            .get("ROLLING_WINDOW_DAYS")
            .map(|s| s.as_str())
            .unwrap_or("7")
            .parse::<usize>()
            .ok()
            .filter(|days| *days >= 1)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "ROLLING_WINDOW_DAYS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            drop_dir,
            rolling_window_days,
        })
    }
}
