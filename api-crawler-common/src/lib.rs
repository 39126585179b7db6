//! # api-crawler Common
//!
//! Foundational types shared across the api-crawler workspace.
//!
//! ## Modules
//!
//! - [`error`] - The [`CrawlerError`] taxonomy and severity classification
//! - [`logging`] - Helpers for rendering values in tracing output

pub mod error;
pub mod logging;

pub use error::{log_by_severity, BoxError, CrawlerError, ErrorSeverity, Result, Severity};
pub use logging::Pretty;
