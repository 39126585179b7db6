//! Error types for the api-crawler configuration system

use api_crawler_common::{CrawlerError, ErrorSeverity, Severity};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Configuration file format not supported
    #[error("Unsupported configuration file format: {format}")]
    UnsupportedFormat { format: String },

    /// Configuration parsing failed
    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[source]
        source: Box<figment::Error>,
    },

    /// Configuration validation failed
    #[error("Invalid configuration value for key '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::ParseError {
            source: Box::new(error),
        }
    }
}

impl Severity for ConfigError {
    fn severity(&self) -> ErrorSeverity {
        // Nothing can be constructed from a broken configuration
        ErrorSeverity::Critical
    }
}

impl From<ConfigError> for CrawlerError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::InvalidValue { key, message } => CrawlerError::Validation {
                parameter: key,
                message,
            },
            other => CrawlerError::validation("config", other.to_string()),
        }
    }
}
