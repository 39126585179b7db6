//! Error types for the data lake

use api_crawler_common::{CrawlerError, ErrorSeverity, Severity};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for data lake operations
pub type LakeResult<T> = Result<T, LakeError>;

/// Failures reading or writing call logs
#[derive(Debug, Error)]
pub enum LakeError {
    /// Filesystem operation on a log, lock or directory failed
    #[error("Failed to {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A log file exists but does not hold a JSON array of entries
    #[error("Call log '{}' is not valid JSON: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An entry could not be encoded
    #[error("Failed to encode call log: {0}")]
    Encode(#[from] serde_json::Error),
}

impl LakeError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        LakeError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

impl Severity for LakeError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            // Recorded history is unavailable until someone repairs the file
            LakeError::Corrupt { .. } => ErrorSeverity::Warning,
            LakeError::Io { .. } | LakeError::Encode(_) => ErrorSeverity::Error,
        }
    }
}

impl From<LakeError> for CrawlerError {
    fn from(error: LakeError) -> Self {
        match error {
            LakeError::Io {
                action,
                path,
                source,
            } => CrawlerError::Io(io::Error::new(
                source.kind(),
                format!("Failed to {} '{}': {}", action, path.display(), source),
            )),
            LakeError::Corrupt { source, .. } | LakeError::Encode(source) => {
                CrawlerError::Json(source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_path_in_message() {
        let err = LakeError::io(
            "read call log",
            "/tmp/lakes/Demo_fetch.json",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );

        assert_eq!(
            err.to_string(),
            "Failed to read call log '/tmp/lakes/Demo_fetch.json': denied"
        );

        let crawler: CrawlerError = err.into();
        match crawler {
            CrawlerError::Io(io) => {
                assert_eq!(io.kind(), io::ErrorKind::PermissionDenied);
                assert!(io.to_string().contains("Demo_fetch.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_corrupt_is_warning() {
        let source = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err = LakeError::Corrupt {
            path: PathBuf::from("x.json"),
            source,
        };
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }
}
