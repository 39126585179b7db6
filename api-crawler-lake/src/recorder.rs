//! Records every invocation of an operation into the data lake
//!
//! A [`CallRecorder`] belongs to one component (usually an adapter). Each
//! recorded call gets a fresh id and second-precision start/end times, and its
//! bound arguments and result are normalized with
//! [`to_lake_value`](crate::to_lake_value). The call's own result is always
//! returned unchanged; failing to write the log is reported through `tracing`
//! and never turns a successful call into a failed one.
//!
//! Arguments are any `Serialize` value whose fields are the parameter names,
//! with defaults already applied, so defaulted parameters are always logged.
//! Values without field names are bound by [`bind_args`](crate::bind_args),
//! so `input.args` is always an object:
//!
//! ```rust
//! use api_crawler_lake::{CallRecorder, DataLake};
//! use serde::Serialize;
//! use std::sync::Arc;
//!
//! #[derive(Serialize)]
//! struct TopPosts<'a> {
//!     subreddit_name: &'a str,
//!     limit: u32,
//! }
//!
//! # let dir = tempfile::tempdir().unwrap();
//! let recorder = CallRecorder::new("RedditApi", Arc::new(DataLake::new(dir.path())));
//! let args = TopPosts { subreddit_name: "rust", limit: 10 };
//!
//! let posts: Result<Vec<String>, std::io::Error> =
//!     recorder.record("get_top_posts", &args, || Ok(vec!["hello".to_string()]));
//!
//! assert_eq!(posts.unwrap(), vec!["hello"]);
//! ```

use crate::entry::{CallLogEntry, LogKey, PendingCall};
use crate::serialize::to_lake_value;
use crate::store::DataLake;
use api_crawler_common::{log_by_severity, Pretty};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

/// Named arguments of a call, in the order they were added
///
/// Usually built with [`call_args!`](crate::call_args).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CallArgs(Map<String, Value>);

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named argument, normalizing its value for the log
    pub fn insert<T>(&mut self, name: &str, value: &T)
    where
        T: Serialize + ?Sized,
    {
        self.0.insert(name.to_string(), to_lake_value(value));
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with<T>(mut self, name: &str, value: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Build [`CallArgs`] from `name: value` pairs
///
/// ```rust
/// use api_crawler_lake::call_args;
/// use serde_json::json;
///
/// let repo_name = "rust-lang/rust";
/// let args = call_args! { repo_name: repo_name, comments: false };
///
/// assert_eq!(args.get("repo_name"), Some(&json!("rust-lang/rust")));
/// assert_eq!(args.get("comments"), Some(&json!(false)));
/// ```
#[macro_export]
macro_rules! call_args {
    () => {
        $crate::CallArgs::new()
    };
    ($($name:ident : $value:expr),+ $(,)?) => {{
        let mut args = $crate::CallArgs::new();
        $( args.insert(stringify!($name), &$value); )+
        args
    }};
}

/// Records calls of one component into a [`DataLake`]
#[derive(Debug, Clone)]
pub struct CallRecorder {
    component: String,
    lake: Arc<DataLake>,
}

impl CallRecorder {
    pub fn new(component: impl Into<String>, lake: Arc<DataLake>) -> Self {
        Self {
            component: component.into(),
            lake,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn lake(&self) -> &Arc<DataLake> {
        &self.lake
    }

    /// Log key for one of this component's operations
    pub fn key(&self, operation: &str) -> LogKey {
        LogKey::new(self.component.as_str(), operation)
    }

    /// Run `call` and record it under `component.operation`
    pub fn record<A, T, E, F>(&self, operation: &str, args: &A, call: F) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize,
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        let pending = PendingCall::start(args);
        let result = call();
        self.persist(operation, finish(pending, &result));
        result
    }

    /// Await `call` and record it under `component.operation`
    ///
    /// The log is appended on a blocking task and awaited before returning,
    /// so calls made in sequence appear in the log in the same order.
    pub async fn record_async<A, T, E, Fut>(
        &self,
        operation: &str,
        args: &A,
        call: Fut,
    ) -> Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize,
        E: Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let pending = PendingCall::start(args);
        let result = call.await;
        self.persist_async(operation, finish(pending, &result)).await;
        result
    }

    /// Wrap `f` so that every [`Recorded::call`] is recorded
    ///
    /// `params` names the function's arguments in order. A struct argument
    /// already carries its names and may pass `&[]`.
    pub fn wrap<F>(&self, operation: impl Into<String>, params: &[&str], f: F) -> Recorded<F> {
        Recorded {
            recorder: self.clone(),
            operation: operation.into(),
            params: params.iter().map(|name| name.to_string()).collect(),
            f,
        }
    }

    fn persist(&self, operation: &str, entry: CallLogEntry) {
        let key = self.key(operation).to_string();
        report(&key, &entry, self.lake.append(&key, &entry));
    }

    async fn persist_async(&self, operation: &str, entry: CallLogEntry) {
        let key = self.key(operation).to_string();
        let lake = Arc::clone(&self.lake);

        let task_key = key.clone();
        let written = tokio::task::spawn_blocking(move || {
            let outcome = lake.append(&task_key, &entry);
            (entry, outcome)
        })
        .await;

        match written {
            Ok((entry, outcome)) => report(&key, &entry, outcome),
            Err(e) => error!("Call log writer for {} did not finish: {}", key, e),
        }
    }
}

fn finish<T, E>(pending: PendingCall, result: &Result<T, E>) -> CallLogEntry
where
    T: Serialize,
    E: Display,
{
    match result {
        Ok(value) => pending.succeed(to_lake_value(value)),
        Err(err) => pending.fail(err.to_string()),
    }
}

fn report(key: &str, entry: &CallLogEntry, outcome: crate::LakeResult<()>) {
    match outcome {
        Ok(()) => debug!(
            "Recorded {} call {} (error: {}) with {}",
            key,
            entry.id,
            entry.error,
            Pretty(&entry.input)
        ),
        Err(e) => log_by_severity(&format!("Failed to record {} call {}", key, entry.id), &e),
    }
}

/// A function whose calls are recorded, created by [`CallRecorder::wrap`]
#[derive(Debug, Clone)]
pub struct Recorded<F> {
    recorder: CallRecorder,
    operation: String,
    params: Vec<String>,
    f: F,
}

impl<F> Recorded<F> {
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Call the wrapped function with `args` and record the call
    pub fn call<A, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        A: Serialize,
        T: Serialize,
        E: Display,
    {
        let pending = PendingCall::start_named(&args, &self.params);
        let result = (self.f)(args);
        self.recorder
            .persist(&self.operation, finish(pending, &result));
        result
    }

    /// Call a wrapped async function with `args` and record the call
    pub async fn call_async<A, T, E, Fut>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: Serialize,
        T: Serialize,
        E: Display,
    {
        let pending = PendingCall::start_named(&args, &self.params);
        let result = (self.f)(args).await;
        self.recorder
            .persist_async(&self.operation, finish(pending, &result))
            .await;
        result
    }
}
