//! Error types shared by every api-crawler crate
//!
//! [`CrawlerError`] is the taxonomy every adapter reports through. Adapters
//! raise the most specific variant they can distinguish so callers can tell
//! retryable failures (transport, bot detection with backoff, rate limiting)
//! from failures that will never succeed on retry (validation, missing
//! credentials).

use std::fmt;
use std::io;
use thiserror::Error as ThisError;

/// Boxed error used to carry transport failures from any client library.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Severity levels for error classification
///
/// - **Warning**: Potential issue but operation can proceed.
/// - **Error**: Operation failed but the system can continue.
/// - **Critical**: System cannot continue, requires immediate attention.
///
/// # Examples
///
/// ```rust
/// use api_crawler_common::ErrorSeverity;
///
/// // An upstream query that legitimately found nothing
/// let empty = ErrorSeverity::Warning;
///
/// // A single request failed, other sources keep working
/// let failed = ErrorSeverity::Error;
///
/// // The log store cannot be written at all
/// let broken = ErrorSeverity::Critical;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Potential issue but operation can proceed
    Warning,
    /// Operation failed but system can continue
    Error,
    /// System cannot continue, requires immediate attention
    Critical,
}

/// Trait for error types that have severity levels
///
/// Every api-crawler error type implements this so call sites can pick a
/// log level without matching on concrete variants.
///
/// ```rust
/// use api_crawler_common::{ErrorSeverity, Severity};
///
/// #[derive(Debug)]
/// enum FetchError {
///     Offline,
///     Empty,
/// }
///
/// impl Severity for FetchError {
///     fn severity(&self) -> ErrorSeverity {
///         match self {
///             FetchError::Offline => ErrorSeverity::Error,
///             FetchError::Empty => ErrorSeverity::Warning,
///         }
///     }
/// }
///
/// assert_eq!(FetchError::Empty.severity(), ErrorSeverity::Warning);
/// ```
pub trait Severity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

/// Result type alias for api-crawler operations
pub type Result<T> = std::result::Result<T, CrawlerError>;

/// Errors raised by data-source adapters
#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum CrawlerError {
    /// A required API key or secret is absent
    #[error("Missing credentials for {source_name}: {}. Set them in the environment or pass them explicitly", missing.join(", "))]
    MissingCredential {
        /// Adapter that needed the credentials
        source_name: String,
        /// Names of every missing key
        missing: Vec<String>,
    },

    /// The upstream query returned nothing parseable where results were expected
    #[error("No results found from {source_name}: {message}")]
    NoResults {
        /// Adapter that ran the query
        source_name: String,
        /// What was being looked for
        message: String,
    },

    /// The upstream source detected automated access (CAPTCHA, challenge page)
    #[error("Bot detection triggered by {source_name}: {message}")]
    BotDetected {
        /// Adapter that hit the challenge
        source_name: String,
        /// Description of the challenge
        message: String,
    },

    /// A caller-supplied parameter is outside its allowed values
    #[error("Invalid value for '{parameter}': {message}")]
    Validation {
        /// Name of the offending parameter
        parameter: String,
        /// Why the value was rejected
        message: String,
    },

    /// The HTTP client or browser automation layer failed
    #[error("{context}: {source}")]
    Transport {
        /// What was being attempted
        context: String,
        /// The underlying client error
        #[source]
        source: BoxError,
    },

    /// The upstream API answered with a non-success status
    #[error("Request to {url} failed with status code: {status}")]
    HttpStatus {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Response body, kept for postmortem review
        body: String,
    },

    /// The upstream API has no equivalent of a capability verb
    #[error("{source_name} does not support '{operation}'")]
    Unsupported {
        /// Adapter name
        source_name: String,
        /// Capability operation that was invoked
        operation: String,
    },

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrawlerError {
    /// Builds a [`CrawlerError::Validation`] for a value outside an allowed set.
    ///
    /// ```rust
    /// use api_crawler_common::CrawlerError;
    ///
    /// let err = CrawlerError::invalid_choice("time_filter", "fortnight", &["day", "week"]);
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Invalid value for 'time_filter': fortnight. Valid options are [day, week]"
    /// );
    /// ```
    pub fn invalid_choice(parameter: &str, value: &str, allowed: &[&str]) -> Self {
        CrawlerError::Validation {
            parameter: parameter.to_string(),
            message: format!("{value}. Valid options are [{}]", allowed.join(", ")),
        }
    }

    /// Builds a [`CrawlerError::Validation`] with a free-form message.
    pub fn validation(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        CrawlerError::Validation {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Wraps a client library failure, keeping it as the error source.
    pub fn transport(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        CrawlerError::Transport {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Builds a [`CrawlerError::NoResults`].
    pub fn no_results(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        CrawlerError::NoResults {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Builds a [`CrawlerError::BotDetected`].
    pub fn bot_detected(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        CrawlerError::BotDetected {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Builds a [`CrawlerError::Unsupported`].
    pub fn unsupported(source_name: impl Into<String>, operation: impl Into<String>) -> Self {
        CrawlerError::Unsupported {
            source_name: source_name.into(),
            operation: operation.into(),
        }
    }

    /// Whether retrying the same call later can reasonably succeed.
    ///
    /// Transport failures, bot detection (after backoff), rate limiting and
    /// server errors are retryable; validation, missing credentials, empty
    /// result sets and unsupported verbs are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            CrawlerError::Transport { .. } | CrawlerError::BotDetected { .. } => true,
            CrawlerError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            CrawlerError::Io(_) => true,
            CrawlerError::MissingCredential { .. }
            | CrawlerError::NoResults { .. }
            | CrawlerError::Validation { .. }
            | CrawlerError::Unsupported { .. }
            | CrawlerError::Json(_) => false,
        }
    }
}

impl Severity for CrawlerError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            // Nothing to do until the operator supplies the key
            CrawlerError::MissingCredential { .. } => ErrorSeverity::Critical,

            CrawlerError::BotDetected { .. } => ErrorSeverity::Error,
            CrawlerError::Validation { .. } => ErrorSeverity::Error,
            CrawlerError::Transport { .. } => ErrorSeverity::Error,
            CrawlerError::HttpStatus { .. } => ErrorSeverity::Error,
            CrawlerError::Unsupported { .. } => ErrorSeverity::Error,
            CrawlerError::Io(_) => ErrorSeverity::Error,
            CrawlerError::Json(_) => ErrorSeverity::Error,

            // The query ran fine, it just matched nothing
            CrawlerError::NoResults { .. } => ErrorSeverity::Warning,
        }
    }
}

/// Logs `context: error` at the tracing level matching the error's severity.
///
/// Used where an error is reported but not returned, or returned after a
/// side effect the caller will not see.
pub fn log_by_severity<E>(context: &str, error: &E)
where
    E: Severity + fmt::Display,
{
    match error.severity() {
        ErrorSeverity::Warning => tracing::warn!("{}: {}", context, error),
        ErrorSeverity::Error => tracing::error!("{}: {}", context, error),
        ErrorSeverity::Critical => tracing::error!("CRITICAL: {}: {}", context, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_lists_every_key() {
        let err = CrawlerError::MissingCredential {
            source_name: "RedditApi".to_string(),
            missing: vec![
                "REDDIT_CLIENT_ID".to_string(),
                "REDDIT_USER_AGENT".to_string(),
            ],
        };

        let message = err.to_string();
        assert!(message.contains("RedditApi"));
        assert!(message.contains("REDDIT_CLIENT_ID, REDDIT_USER_AGENT"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CrawlerError::bot_detected("Indeed", "captcha").is_retryable());
        assert!(CrawlerError::transport("GET /x", "connection reset").is_retryable());
        assert!(CrawlerError::HttpStatus {
            url: "https://api.github.com".to_string(),
            status: 503,
            body: String::new(),
        }
        .is_retryable());
        assert!(CrawlerError::HttpStatus {
            url: "https://api.github.com".to_string(),
            status: 429,
            body: String::new(),
        }
        .is_retryable());

        assert!(!CrawlerError::HttpStatus {
            url: "https://api.github.com".to_string(),
            status: 404,
            body: String::new(),
        }
        .is_retryable());
        assert!(!CrawlerError::invalid_choice("kind", "id", &["css"]).is_retryable());
        assert!(!CrawlerError::MissingCredential {
            source_name: "GithubApi".to_string(),
            missing: vec!["GITHUB_API_KEY".to_string()],
        }
        .is_retryable());
        assert!(!CrawlerError::no_results("Indeed", "job list").is_retryable());
    }

    #[test]
    fn test_transport_keeps_source() {
        use std::error::Error;

        let io = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        let err = CrawlerError::transport("GET https://example.com", io);

        assert_eq!(err.to_string(), "GET https://example.com: timed out");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_no_results_is_warning() {
        let err = CrawlerError::no_results("BraveSearch", "web results");
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test_log::test]
    fn test_log_by_severity_does_not_panic() {
        log_by_severity("search", &CrawlerError::no_results("BraveSearch", "web results"));
        log_by_severity("request", &CrawlerError::unsupported("SerpApi", "post"));
    }
}
