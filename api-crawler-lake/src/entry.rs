//! Call log entries and the keys that name their log files

use crate::serialize::to_lake_value;
use chrono::{DateTime, FixedOffset, Local, SubsecRound};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use uuid::Uuid;

/// Second-precision timestamp with the local UTC offset
pub type Timestamp = DateTime<FixedOffset>;

/// Current local time truncated to whole seconds
pub fn now() -> Timestamp {
    Local::now().trunc_subsecs(0).fixed_offset()
}

/// One recorded invocation
///
/// ```json
/// {
///  "id": "5c0b6a9e-...",
///  "start_time": "2024-05-01T12:00:00+00:00",
///  "end_time": "2024-05-01T12:00:01+00:00",
///  "input": {"args": {"term": "x"}},
///  "output": {"count": 2},
///  "error": false,
///  "error_log": ""
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLogEntry {
    pub id: Uuid,
    #[serde(with = "iso_seconds")]
    pub start_time: Timestamp,
    #[serde(with = "iso_seconds")]
    pub end_time: Timestamp,
    pub input: Value,
    pub output: Value,
    pub error: bool,
    pub error_log: String,
}

impl CallLogEntry {
    /// The recorded arguments, `input.args`
    pub fn args(&self) -> Option<&Value> {
        self.input.get("args")
    }
}

/// A call that has started but not yet returned
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub id: Uuid,
    pub start_time: Timestamp,
    pub input: Value,
}

impl PendingCall {
    /// Stamp a new call with a fresh id and the bound arguments
    ///
    /// See [`bind_args`] for how non-struct arguments are named.
    pub fn start<A>(args: &A) -> Self
    where
        A: Serialize + ?Sized,
    {
        Self::start_named(args, &[])
    }

    /// Like [`start`](Self::start), naming positional arguments with `params`
    pub fn start_named<A>(args: &A, params: &[String]) -> Self
    where
        A: Serialize + ?Sized,
    {
        let bound = bind_args(to_lake_value(args), params);
        Self {
            id: Uuid::new_v4(),
            start_time: now(),
            input: json!({ "args": bound }),
        }
    }

    /// Finish with a successful return value
    pub fn succeed(self, output: Value) -> CallLogEntry {
        self.finish(output, None)
    }

    /// Finish with the error the call raised
    pub fn fail(self, message: impl Into<String>) -> CallLogEntry {
        self.finish(Value::Null, Some(message.into()))
    }

    fn finish(self, output: Value, error: Option<String>) -> CallLogEntry {
        // now() truncates to seconds, never earlier than start_time
        let end_time = now().max(self.start_time);

        CallLogEntry {
            id: self.id,
            start_time: self.start_time,
            end_time,
            input: self.input,
            output,
            error: error.is_some(),
            error_log: error.unwrap_or_default(),
        }
    }
}

/// Bind a normalized argument value to parameter names
///
/// `input.args` is always an object:
/// - structs, maps and [`CallArgs`](crate::CallArgs) are already named and kept
/// - `()` binds nothing when there are no parameter names
/// - a tuple binds its elements to `params` in order
/// - any other value binds to the first name
///
/// Positions without a name fall back to `arg0`, `arg1`, ...
///
/// ```rust
/// use api_crawler_lake::bind_args;
/// use serde_json::json;
///
/// let params = vec!["owner".to_string(), "repo".to_string()];
/// let bound = bind_args(json!(["rust-lang", "rust"]), &params);
///
/// assert_eq!(bound["owner"], json!("rust-lang"));
/// assert_eq!(bind_args(json!(7), &[])["arg0"], json!(7));
/// assert!(bind_args(json!(null), &[]).is_empty());
/// ```
pub fn bind_args(value: Value, params: &[String]) -> Map<String, Value> {
    match value {
        Value::Object(named) => named,
        Value::Null if params.is_empty() => Map::new(),
        Value::Array(items) if params.len() != 1 => items
            .into_iter()
            .enumerate()
            .map(|(position, item)| (param_name(params, position), item))
            .collect(),
        single => std::iter::once((param_name(params, 0), single)).collect(),
    }
}

fn param_name(params: &[String], position: usize) -> String {
    params
        .get(position)
        .cloned()
        .unwrap_or_else(|| format!("arg{position}"))
}

/// Stable `component.operation` name of a call log
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogKey {
    component: String,
    operation: String,
}

impl LogKey {
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// File name of this key's log, e.g. `Demo_fetch.json`
    pub fn file_name(&self) -> String {
        log_file_name(&self.to_string())
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.operation)
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
///
/// ```rust
/// use api_crawler_lake::sanitize_key;
///
/// assert_eq!(sanitize_key("GithubApi.get_repo_issues"), "GithubApi_get_repo_issues");
/// assert_eq!(sanitize_key("../etc/passwd"), "___etc_passwd");
/// ```
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File name for a raw `component.operation` key
pub fn log_file_name(key: &str) -> String {
    format!("{}.json", sanitize_key(key))
}

/// RFC 3339 at second precision, `2024-05-01T12:00:00+02:00`
mod iso_seconds {
    use super::Timestamp;
    use chrono::{DateTime, SecondsFormat};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, false))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)
    }
}
