use crate::validation::{
    ValidatorConfig, DEFAULT_MAX_AGE_HOURS, DEFAULT_MIN_EXPECTED_POSITIONS,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub portfolio_file: Option<PathBuf>,
    pub max_age_hours: u32,
    pub min_expected_positions: usize,
    pub strict_validation: bool,
    pub source_timeout_secs: u64,
    pub se_aggregated_url: Option<String>,
    pub se_detailed_url: Option<String>,
    pub fi_positions_url: Option<String>,
    pub port: u16,
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub transport: TransportConfig,
}

/// Where a consumer reads the publisher's files from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    File { dir: PathBuf },
    Http { base_url: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    expected: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), format!("must be {}", expected))
            }),
    }
}

fn non_empty(env_map: &HashMap<String, String>, key: &str) -> Option<String> {
    env_map
        .get(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let data_dir = non_empty(&env_map, "DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("short_data"));
        let portfolio_file = non_empty(&env_map, "PORTFOLIO_FILE").map(PathBuf::from);

        let max_age_hours = parse_or(
            &env_map,
            "MAX_AGE_HOURS",
            DEFAULT_MAX_AGE_HOURS,
            "a whole number of hours",
        )?;
        if max_age_hours == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_AGE_HOURS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }
        let min_expected_positions = parse_or(
            &env_map,
            "MIN_EXPECTED_POSITIONS",
            DEFAULT_MIN_EXPECTED_POSITIONS,
            "a non-negative integer",
        )?;

        let strict_validation = match env_map
            .get("STRICT_VALIDATION")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
            .unwrap_or("false")
        {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STRICT_VALIDATION".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let source_timeout_secs =
            parse_or(&env_map, "SOURCE_TIMEOUT_SECS", 30u64, "a number of seconds")?;
        let port = parse_or(&env_map, "PORT", 8080u16, "a valid u16")?;

        let cache_dir = non_empty(&env_map, "CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("remote_cache"));
        let cache_ttl_secs =
            parse_or(&env_map, "CACHE_TTL_SECS", 6 * 3600u64, "a number of seconds")?;

        let transport = match env_map
            .get("TRANSPORT")
            .map(|s| s.trim())
            .unwrap_or("file")
        {
            "file" => TransportConfig::File {
                dir: non_empty(&env_map, "TRANSPORT_LOCATION")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| data_dir.clone()),
            },
            "http" => TransportConfig::Http {
                base_url: non_empty(&env_map, "TRANSPORT_LOCATION")
                    .ok_or_else(|| ConfigError::MissingEnv("TRANSPORT_LOCATION".to_string()))?,
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "TRANSPORT".to_string(),
                    format!("must be file or http, got {}", other),
                ))
            }
        };

        Ok(Config {
            data_dir,
            portfolio_file,
            max_age_hours,
            min_expected_positions,
            strict_validation,
            source_timeout_secs,
            se_aggregated_url: non_empty(&env_map, "SE_AGGREGATED_URL"),
            se_detailed_url: non_empty(&env_map, "SE_DETAILED_URL"),
            fi_positions_url: non_empty(&env_map, "FI_POSITIONS_URL"),
            port,
            cache_dir,
            cache_ttl_secs,
            transport,
        })
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            max_age_hours: self.max_age_hours,
            min_expected_positions: self.min_expected_positions,
            strict_mode: self.strict_validation,
        }
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
