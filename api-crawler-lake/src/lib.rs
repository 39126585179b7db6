//! # api-crawler Lake
//!
//! The call-logging layer. Every designated adapter operation is recorded as a
//! [`CallLogEntry`] appended to a per-operation JSON file in a [`DataLake`].
//!
//! ## Modules
//!
//! - [`serialize`] - Infallible normalization of values into JSON
//! - [`entry`] - Entry model, timestamps and log keys
//! - [`store`] - The locked, append-only log files
//! - [`recorder`] - [`CallRecorder`] and the [`call_args!`] macro
//!
//! ```rust
//! use api_crawler_lake::{call_args, CallRecorder, DataLake};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! # let dir = tempfile::tempdir().unwrap();
//! let lake = Arc::new(DataLake::new(dir.path()));
//! let recorder = CallRecorder::new("Demo", Arc::clone(&lake));
//!
//! let out: Result<Value, std::io::Error> =
//!     recorder.record("fetch", &call_args! { term: "x" }, || Ok(json!({"count": 2})));
//!
//! assert_eq!(out.unwrap(), json!({"count": 2}));
//! assert_eq!(lake.entries("Demo.fetch").unwrap()[0].input, json!({"args": {"term": "x"}}));
//! ```

pub mod entry;
pub mod error;
pub mod recorder;
pub mod serialize;
pub mod store;

pub use entry::{bind_args, log_file_name, now, sanitize_key, CallLogEntry, LogKey, PendingCall, Timestamp};
pub use error::{LakeError, LakeResult};
pub use recorder::{CallArgs, CallRecorder, Recorded};
pub use serialize::{display, to_lake_value, Opaque};
pub use store::{read_log, DataLake};
