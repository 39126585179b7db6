//! # api-crawler Configuration
//!
//! Figment-backed configuration for the data lake, REST transport and
//! headless browser, plus credential resolution for adapters.
//!
//! ```no_run
//! use api_crawler_config::CrawlerConfig;
//!
//! // Defaults, then API_CRAWLER_* and LAKES_BASE_DIR from the environment
//! let config = CrawlerConfig::from_env()?;
//! println!("lake: {}", config.lake.base_dir.display());
//! # Ok::<(), api_crawler_config::ConfigError>(())
//! ```

pub mod credentials;
pub mod error;
pub mod provider;
pub mod types;

pub use credentials::{Credentials, ResolvedCredentials, Secret};
pub use error::ConfigError;
pub use provider::{ConfigProvider, ENV_PREFIX, LAKES_BASE_DIR_VAR};
pub use types::{
    BrowserConfig, CredentialConfig, CredentialPolicy, CrawlerConfig, HttpConfig, LakeConfig,
    DEFAULT_BROWSER_USER_AGENT, DEFAULT_LAKE_DIR, MAX_HTTP_RETRIES,
};

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
