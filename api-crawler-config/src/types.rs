//! Configuration types for api-crawler

use crate::error::ConfigError;
use crate::ConfigResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for `http.max_retries`
pub const MAX_HTTP_RETRIES: u32 = 10;

/// Default directory for recorded call logs
pub const DEFAULT_LAKE_DIR: &str = "lakes";

/// Desktop Chrome user agent used for rendered pages
pub const DEFAULT_BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36";

/// Top-level configuration for every adapter and the data lake
///
/// Every section falls back to its defaults, so an empty file or no file at
/// all yields a usable configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Where recorded calls are written
    pub lake: LakeConfig,
    /// How missing credentials are treated
    pub credentials: CredentialConfig,
    /// Settings for REST adapters
    pub http: HttpConfig,
    /// Settings for browser-driven adapters
    pub browser: BrowserConfig,
}

impl CrawlerConfig {
    /// Rejects values no adapter can work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.lake.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "lake.base_dir".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "http.timeout_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.http.max_retries > MAX_HTTP_RETRIES {
            return Err(ConfigError::InvalidValue {
                key: "http.max_retries".to_string(),
                message: format!(
                    "{} exceeds the limit of {}",
                    self.http.max_retries, MAX_HTTP_RETRIES
                ),
            });
        }
        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::InvalidValue {
                key: "browser.window_size".to_string(),
                message: format!(
                    "{}x{} has a zero dimension",
                    self.browser.window_width, self.browser.window_height
                ),
            });
        }
        Ok(())
    }
}

/// Data lake location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LakeConfig {
    /// Directory holding one JSON file per recorded operation
    pub base_dir: PathBuf,
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_LAKE_DIR),
        }
    }
}

/// What an adapter does when a required credential is absent at construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialPolicy {
    /// Fail construction with every missing key listed
    #[default]
    Strict,
    /// Warn and construct anyway; operations needing the key fail later
    Lenient,
}

/// Credential handling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub policy: CredentialPolicy,
}

/// HTTP transport settings shared by REST adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
    /// Retries after the first attempt for retryable failures
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further attempt
    pub retry_delay_ms: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("api-crawler/{}", env!("CARGO_PKG_VERSION")),
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Headless browser settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Time given to a page to settle after navigation
    pub page_load_delay_ms: u64,
    pub user_agent: String,
    /// Explicit Chrome binary, detected when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,
}

impl BrowserConfig {
    pub fn page_load_delay(&self) -> Duration {
        Duration::from_millis(self.page_load_delay_ms)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1200,
            window_height: 600,
            page_load_delay_ms: 2000,
            user_agent: DEFAULT_BROWSER_USER_AGENT.to_string(),
            chrome_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CrawlerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lake.base_dir, PathBuf::from("lakes"));
        assert_eq!(config.credentials.policy, CredentialPolicy::Strict);
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
        assert_eq!(config.browser.page_load_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_policy_serializes_lowercase() {
        let json = serde_json::to_string(&CredentialPolicy::Lenient).unwrap();
        assert_eq!(json, "\"lenient\"");

        let parsed: CredentialPolicy = serde_json::from_str("\"strict\"").unwrap();
        assert_eq!(parsed, CredentialPolicy::Strict);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: CrawlerConfig =
            serde_json::from_str(r#"{"http": {"max_retries": 0}}"#).unwrap();

        assert_eq!(config.http.max_retries, 0);
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_validate_bounds_max_retries() {
        let mut config = CrawlerConfig::default();
        config.http.max_retries = MAX_HTTP_RETRIES;
        assert!(config.validate().is_ok());

        config.http.max_retries = 40;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http.max_retries"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = CrawlerConfig::default();
        config.http.timeout_secs = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http.timeout_secs"));
    }

    #[test]
    fn test_validate_rejects_empty_window() {
        let mut config = CrawlerConfig::default();
        config.browser.window_height = 0;

        assert!(config.validate().is_err());
    }
}
