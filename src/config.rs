use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::str::FromStr;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

fn default_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub max_file_size: usize,
    pub preview_rows: usize,
    pub cache_capacity: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: default_addr(),
            max_file_size: default_max_file_size(),
            preview_rows: 100,
            cache_capacity: 32,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, falling back to defaults for
    /// unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();
        Ok(Config {
            addr: parse_or("SHEET_EXPLORER_ADDR", &lookup, defaults.addr)?,
            max_file_size: parse_or("MAX_FILE_SIZE", &lookup, defaults.max_file_size)?,
            preview_rows: parse_or("PREVIEW_ROWS", &lookup, defaults.preview_rows)?,
            cache_capacity: parse_or("DATASET_CACHE_CAPACITY", &lookup, defaults.cache_capacity)?,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {}={}", key, raw)),
        None => Ok(default),
    }
}

pub fn load_config() -> Result<Config> {
    Config::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn falls_back_to_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.addr, default_addr());
        assert_eq!(config.preview_rows, 100);
    }

    #[test]
    fn reads_overrides() {
        let env: HashMap<&str, &str> = [
            ("SHEET_EXPLORER_ADDR", "0.0.0.0:8080"),
            ("PREVIEW_ROWS", "25"),
            ("LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.preview_rows, 25);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn rejects_invalid_numbers() {
        let err = Config::from_lookup(|k| (k == "MAX_FILE_SIZE").then(|| "lots".to_string()));
        assert!(err.is_err());
    }
}
