//! Formatting helpers for log lines

use serde::Serialize;
use std::fmt::Debug;

/// Indented JSON of a value, for search options and recorded call inputs
/// in `debug!` lines
///
/// ```rust
/// use api_crawler_common::Pretty;
/// use serde_json::json;
///
/// let params = json!({"per_page": 100});
/// assert_eq!(Pretty(&params).to_string(), "\n{\n  \"per_page\": 100\n}");
/// ```
///
/// Falls back to `{:#?}` when the value cannot be encoded as JSON.
pub struct Pretty<T>(pub T);

impl<T: Serialize + Debug> std::fmt::Display for Pretty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string_pretty(&self.0) {
            Ok(json) => write!(f, "\n{}", json),
            Err(_) => write!(f, "\n{:#?}", self.0),
        }
    }
}

impl<T: Serialize + Debug> std::fmt::Debug for Pretty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}
