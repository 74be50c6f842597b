use super::error::ConfigError;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.exchangerate-api.com/v4";

pub const DEFAULT_CACHE_TTL: u64 = 3600;
pub const MIN_CACHE_TTL: u64 = 60;
pub const MAX_CACHE_TTL: u64 = 86400;

pub const DEFAULT_MAX_REQUESTS_PER_MINUTE: u32 = 60;
pub const MIN_REQUESTS_PER_MINUTE: u32 = 10;
pub const MAX_REQUESTS_PER_MINUTE: u32 = 120;

pub const DEFAULT_MONITORING_INTERVAL: u64 = 600;
pub const MIN_MONITORING_INTERVAL: u64 = 60;
pub const MAX_MONITORING_INTERVAL: u64 = 3600;

const CACHE_FILE: &str = "currencies.json";
const ALERTS_FILE: &str = "alerts.json";

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    /// Seconds a fetched rate stays fresh.
    pub cache_ttl: u64,
    pub max_requests_per_minute: u32,
    pub data_dir: Option<PathBuf>,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_url: DEFAULT_API_URL.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            max_requests_per_minute: DEFAULT_MAX_REQUESTS_PER_MINUTE,
            data_dir: None,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            request_timeout_secs: 30,
        }
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config file at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fxwatch", "fxwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Checks every bounded setting and reports the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "api_url",
                reason: format!("'{}' is not an http(s) URL", self.api_url),
            });
        }
        check_range("cache_ttl", self.cache_ttl, MIN_CACHE_TTL, MAX_CACHE_TTL)?;
        check_range(
            "max_requests_per_minute",
            self.max_requests_per_minute.into(),
            MIN_REQUESTS_PER_MINUTE.into(),
            MAX_REQUESTS_PER_MINUTE.into(),
        )?;
        check_range("retry_attempts", self.retry_attempts.into(), 1, 10)?;
        check_range("request_timeout_secs", self.request_timeout_secs, 1, 300)?;
        Ok(())
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_dir {
            return Ok(custom_path.clone());
        }
        let proj_dirs = ProjectDirs::from("dev", "fxwatch", "fxwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn currencies_file(&self) -> Result<PathBuf> {
        Ok(self.data_path()?.join(CACHE_FILE))
    }

    pub fn alerts_file(&self) -> Result<PathBuf> {
        Ok(self.data_path()?.join(ALERTS_FILE))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Bounds the alert monitoring interval to what the monitor accepts.
pub fn validate_monitoring_interval(seconds: u64) -> Result<Duration, ConfigError> {
    check_range(
        "interval",
        seconds,
        MIN_MONITORING_INTERVAL,
        MAX_MONITORING_INTERVAL,
    )?;
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
api_url: "http://localhost:8080"
cache_ttl: 120
max_requests_per_minute: 30
data_dir: "/tmp/fxwatch"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.api_url, "http://localhost:8080");
        assert_eq!(config.cache_ttl, 120);
        assert_eq!(config.max_requests_per_minute, 30);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/fxwatch")));
        assert_eq!(config.retry_attempts, 3);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.currencies_file().unwrap(),
            PathBuf::from("/tmp/fxwatch/currencies.json")
        );
        assert_eq!(
            config.alerts_file().unwrap(),
            PathBuf::from("/tmp/fxwatch/alerts.json")
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(
            config.max_requests_per_minute,
            DEFAULT_MAX_REQUESTS_PER_MINUTE
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_ttl_bounds() {
        for (ttl, ok) in [(59, false), (60, true), (86400, true), (86401, false)] {
            let config = AppConfig {
                cache_ttl: ttl,
                ..AppConfig::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "cache_ttl={ttl}");
        }
    }

    #[test]
    fn test_rate_limit_bounds() {
        let config = AppConfig {
            max_requests_per_minute: 121,
            ..AppConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "max_requests_per_minute",
                value: 121,
                min: 10,
                max: 120,
            })
        );

        let config = AppConfig {
            max_requests_per_minute: 10,
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_api_url() {
        let config = AppConfig {
            api_url: "ftp://example.com".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "api_url", .. })
        ));
    }

    #[test]
    fn test_load_from_path_rejects_out_of_range() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "cache_ttl: 5\n").unwrap();
        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("cache_ttl must be between 60 and 86400"));
    }

    #[test]
    fn test_monitoring_interval_bounds() {
        assert!(validate_monitoring_interval(59).is_err());
        assert_eq!(
            validate_monitoring_interval(600).unwrap(),
            Duration::from_secs(600)
        );
        assert!(validate_monitoring_interval(3601).is_err());
    }
}
